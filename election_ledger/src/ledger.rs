use log::{debug, info, warn};

use std::collections::HashSet;

use crate::config::*;
use crate::store::ElectionStore;

/// The only writer of the vote tally and of the voted set.
///
/// The ledger holds the store exclusively for its whole lifetime. The
/// already-voted check and the commit in [`Ledger::submit_ballot`] therefore
/// run inside a single borrow and cannot interleave with another submission.
pub struct Ledger<'a> {
    store: &'a mut ElectionStore,
    rules: &'a ElectionRules,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a mut ElectionStore, rules: &'a ElectionRules) -> Ledger<'a> {
        Ledger { store, rules }
    }

    pub fn has_voted(&self, voter_id: &VoterId) -> bool {
        self.store.voted.contains(voter_id)
    }

    /// Records a ballot: one vote per entry, then marks the voter.
    ///
    /// The whole ballot is validated first. On any error nothing is written.
    /// The tally is updated before the voter is marked, so an interruption in
    /// between could only under-count (the voter may vote again), never count a
    /// ballot twice.
    pub fn submit_ballot(&mut self, voter_id: &VoterId, ballot: &Ballot) -> Result<(), ElectionError> {
        if self.store.voter(voter_id).is_none() {
            warn!("submit_ballot: unknown voter {}", voter_id);
            return Err(ElectionError::UnknownVoter(voter_id.clone()));
        }
        if self.has_voted(voter_id) {
            warn!("submit_ballot: voter {} has already voted, rejecting", voter_id);
            return Err(ElectionError::AlreadyVoted(voter_id.clone()));
        }
        if let Err(e) = check_ballot(&*self.store, self.rules, ballot) {
            warn!("submit_ballot: voter {}: {}", voter_id, e);
            return Err(e);
        }

        for (post_id, candidate_id) in ballot.iter() {
            debug!(
                "submit_ballot: voter {}: post {} -> candidate {}",
                voter_id, post_id, candidate_id
            );
            *self
                .store
                .votes
                .entry(post_id.clone())
                .or_default()
                .entry(candidate_id.clone())
                .or_insert(VoteCount::EMPTY) += VoteCount::ONE;
        }
        self.store.voted.insert(voter_id.clone());
        info!(
            "Recorded ballot of voter {} ({} post(s))",
            voter_id,
            ballot.len()
        );
        Ok(())
    }

    /// Clears every recorded vote and the voted set.
    ///
    /// There is no undo. Callers must have re-checked the admin credentials.
    pub fn reset_all(&mut self) {
        let total: VoteCount = self
            .store
            .votes
            .values()
            .flat_map(|m| m.values().cloned())
            .sum();
        info!(
            "Resetting the ledger: discarding {} vote(s) from {} voter(s)",
            total,
            self.store.voted.len()
        );
        self.store.votes.clear();
        self.store.voted.clear();
    }

    /// Deletes a post, its candidates and its votes.
    ///
    /// Voters who voted are not un-marked, even if this was the only post they
    /// voted in.
    pub fn delete_post(&mut self, post_id: &PostId) -> Result<Post, ElectionError> {
        self.store.remove_post(post_id)
    }
}

fn check_ballot(
    store: &ElectionStore,
    rules: &ElectionRules,
    ballot: &Ballot,
) -> Result<(), ElectionError> {
    if ballot.is_empty() {
        return Err(ElectionError::InvalidBallot(
            "the ballot holds no choice".to_string(),
        ));
    }
    for (post_id, candidate_id) in ballot.iter() {
        let post = store.post(post_id).ok_or_else(|| {
            ElectionError::InvalidBallot(format!("post {} does not exist", post_id))
        })?;
        if store.candidates_for_post(post_id).next().is_none() {
            return Err(ElectionError::InvalidBallot(format!(
                "post {} ({}) has no candidates",
                post_id, post.title
            )));
        }
        match store.candidate(candidate_id) {
            None => {
                return Err(ElectionError::InvalidBallot(format!(
                    "candidate {} does not exist",
                    candidate_id
                )));
            }
            Some(c) if c.post_id != *post_id => {
                return Err(ElectionError::InvalidBallot(format!(
                    "candidate {} ({}) is not running for post {} ({})",
                    candidate_id, c.name, post_id, post.title
                )));
            }
            Some(_) => {}
        }
    }
    if rules.require_complete_ballot {
        let chosen: HashSet<&PostId> = ballot.iter().map(|(p, _)| p).collect();
        let missing: Vec<&Post> = store
            .posts()
            .iter()
            .filter(|p| store.candidates_for_post(&p.id).next().is_some())
            .filter(|p| !chosen.contains(&p.id))
            .collect();
        if let Some(p) = missing.first() {
            return Err(ElectionError::InvalidBallot(format!(
                "no choice for post {} ({}), {} post(s) missing",
                p.id,
                p.title,
                missing.len()
            )));
        }
    }
    Ok(())
}
