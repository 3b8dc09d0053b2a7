pub use crate::config::*;
use crate::store::ElectionStore;

/// A builder for assembling a ballot before submission.
///
/// Choices are checked against the store as they are made, so that a
/// front end can reject a bad selection immediately instead of at submission.
///
/// ```
/// use election_ledger::builder::Builder;
/// use election_ledger::store::ElectionStore;
/// use election_ledger::{CandidateProfile, ElectionError};
///
/// let mut store = ElectionStore::default();
/// let post = store.add_post("President", "Leads the student council")?;
/// let anna = store.add_candidate(&post.id, CandidateProfile::named("Anna"))?;
///
/// let mut builder = Builder::new(&store);
/// builder.select(&post.id, &anna.id)?;
/// assert!(builder.is_complete());
///
/// let ballot = builder.build();
/// assert_eq!(ballot.choice(&post.id), Some(&anna.id));
///
/// # Ok::<(), ElectionError>(())
/// ```
pub struct Builder<'a> {
    store: &'a ElectionStore,
    ballot: Ballot,
}

/// What a call to [`Builder::select`] did.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Selection {
    Selected,
    /// The candidate was already selected: the post has no choice anymore.
    Deselected,
    /// Another candidate was selected for this post and has been replaced.
    Replaced(CandidateId),
}

/// How far a voter is through the posts that can be voted in.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct VotingProgress {
    pub total: usize,
    pub voted: usize,
    pub percentage: f64,
}

impl<'a> Builder<'a> {
    pub fn new(store: &'a ElectionStore) -> Builder<'a> {
        Builder {
            store,
            ballot: Ballot::new(),
        }
    }

    /// Selects a candidate for a post.
    ///
    /// Selecting the candidate that is already chosen toggles it off.
    pub fn select(
        &mut self,
        post_id: &PostId,
        candidate_id: &CandidateId,
    ) -> Result<Selection, ElectionError> {
        if self.store.post(post_id).is_none() {
            return Err(ElectionError::UnknownPost(post_id.clone()));
        }
        match self.store.candidate(candidate_id) {
            Some(c) if c.post_id == *post_id => {}
            Some(c) => {
                return Err(ElectionError::InvalidBallot(format!(
                    "candidate {} ({}) is not running for post {}",
                    candidate_id, c.name, post_id
                )));
            }
            None => return Err(ElectionError::UnknownCandidate(candidate_id.clone())),
        }
        if self.ballot.choice(post_id) == Some(candidate_id) {
            self.ballot.withdraw(post_id);
            return Ok(Selection::Deselected);
        }
        match self.ballot.choose(post_id.clone(), candidate_id.clone()) {
            Some(previous) => Ok(Selection::Replaced(previous)),
            None => Ok(Selection::Selected),
        }
    }

    /// Only posts with at least one candidate count towards the total.
    pub fn progress(&self) -> VotingProgress {
        let total = self.votable_posts();
        let voted = self.ballot.len();
        VotingProgress {
            total,
            voted,
            percentage: if total > 0 {
                (voted as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }

    /// A choice has been made for every post that has candidates.
    pub fn is_complete(&self) -> bool {
        let p = self.progress();
        p.total > 0 && p.voted == p.total
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn build(self) -> Ballot {
        self.ballot
    }

    fn votable_posts(&self) -> usize {
        self.store
            .posts()
            .iter()
            .filter(|p| self.store.candidates_for_post(&p.id).next().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ElectionStore, PostId, PostId, CandidateId, CandidateId, CandidateId) {
        let mut store = ElectionStore::default();
        let p1 = store.add_post("President", "").unwrap().id;
        let p2 = store.add_post("Secretary", "").unwrap().id;
        store.add_post("Treasurer", "").unwrap();
        let a = store.add_candidate(&p1, CandidateProfile::named("A")).unwrap().id;
        let b = store.add_candidate(&p1, CandidateProfile::named("B")).unwrap().id;
        let c = store.add_candidate(&p2, CandidateProfile::named("C")).unwrap().id;
        (store, p1, p2, a, b, c)
    }

    #[test]
    fn select_toggles_and_replaces() {
        let (store, p1, _, a, b, _) = store();
        let mut builder = Builder::new(&store);
        assert_eq!(builder.select(&p1, &a), Ok(Selection::Selected));
        assert_eq!(builder.select(&p1, &b), Ok(Selection::Replaced(a.clone())));
        assert_eq!(builder.select(&p1, &b), Ok(Selection::Deselected));
        assert!(builder.ballot().is_empty());
    }

    #[test]
    fn progress_ignores_posts_without_candidates() {
        let (store, p1, p2, a, _, c) = store();
        let mut builder = Builder::new(&store);
        assert_eq!(builder.progress().total, 2);
        assert_eq!(builder.progress().percentage, 0.0);
        builder.select(&p1, &a).unwrap();
        assert_eq!(builder.progress().voted, 1);
        assert_eq!(builder.progress().percentage, 50.0);
        assert!(!builder.is_complete());
        builder.select(&p2, &c).unwrap();
        assert!(builder.is_complete());
        assert_eq!(builder.build().len(), 2);
    }

    #[test]
    fn wrong_post_is_refused() {
        let (store, p1, _, _, _, c) = store();
        let mut builder = Builder::new(&store);
        assert!(matches!(
            builder.select(&p1, &c),
            Err(ElectionError::InvalidBallot(_))
        ));
        assert_eq!(
            builder.select(&PostId::from("x"), &c),
            Err(ElectionError::UnknownPost(PostId::from("x")))
        );
        assert_eq!(
            builder.select(&p1, &CandidateId::from("x")),
            Err(ElectionError::UnknownCandidate(CandidateId::from("x")))
        );
    }

    #[test]
    fn empty_election_is_never_complete() {
        let store = ElectionStore::default();
        let builder = Builder::new(&store);
        assert!(!builder.is_complete());
        assert_eq!(builder.progress().total, 0);
    }
}
