//! The election state: admin account, posts, candidates, voters, the vote
//! tally and the set of voters who have cast a ballot.
//!
//! The store is a plain value. Components that read or change it borrow it:
//! [`crate::credentials::CredentialStore`] and
//! [`crate::results::ResultsAggregator`] take a shared reference,
//! [`crate::ledger::Ledger`] takes an exclusive one.

use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::config::*;

#[derive(PartialEq, Debug, Clone, Default)]
pub struct ElectionStore {
    admin: AdminCredentials,
    posts: Vec<Post>,
    candidates: Vec<Candidate>,
    voters: Vec<Voter>,
    pub(crate) votes: VoteTally,
    pub(crate) voted: BTreeSet<VoterId>,
    // Highest numeric id handed out so far.
    last_id: u64,
}

impl ElectionStore {
    /// An empty election with the given administrator.
    pub fn new(admin: AdminCredentials) -> ElectionStore {
        ElectionStore {
            admin,
            ..Default::default()
        }
    }

    /// Assembles a store from previously saved records.
    ///
    /// Records that break the ownership rules are dropped with a warning:
    /// candidates of a missing post, and tally entries for a missing post or for
    /// a candidate that does not belong to the post.
    pub fn from_parts(
        admin: AdminCredentials,
        posts: Vec<Post>,
        candidates: Vec<Candidate>,
        voters: Vec<Voter>,
        votes: VoteTally,
        voted: BTreeSet<VoterId>,
    ) -> ElectionStore {
        let post_ids: HashSet<&PostId> = posts.iter().map(|p| &p.id).collect();
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                let keep = post_ids.contains(&c.post_id);
                if !keep {
                    warn!(
                        "from_parts: dropping candidate {} of unknown post {}",
                        c.id, c.post_id
                    );
                }
                keep
            })
            .collect();

        let mut clean_votes: VoteTally = BTreeMap::new();
        for (post_id, counts) in votes {
            for (candidate_id, count) in counts {
                let belongs = candidates
                    .iter()
                    .any(|c| c.id == candidate_id && c.post_id == post_id);
                if belongs {
                    clean_votes
                        .entry(post_id.clone())
                        .or_default()
                        .insert(candidate_id, count);
                } else {
                    warn!(
                        "from_parts: dropping {} orphan vote(s) for candidate {} under post {}",
                        count, candidate_id, post_id
                    );
                }
            }
        }

        let mut codes: HashSet<&str> = HashSet::new();
        for v in voters.iter() {
            if !codes.insert(v.student_code.as_str()) {
                warn!("from_parts: student code {} is registered twice", v.student_code);
            }
        }

        let last_id = posts
            .iter()
            .map(|p| p.id.0.as_str())
            .chain(candidates.iter().map(|c| c.id.0.as_str()))
            .chain(voters.iter().map(|v| v.id.0.as_str()))
            .filter_map(|s| s.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        debug!(
            "from_parts: {} posts, {} candidates, {} voters, {} voted",
            posts.len(),
            candidates.len(),
            voters.len(),
            voted.len()
        );
        ElectionStore {
            admin,
            posts,
            candidates,
            voters,
            votes: clean_votes,
            voted,
            last_id,
        }
    }

    pub fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn voters(&self) -> &[Voter] {
        &self.voters
    }

    pub fn votes(&self) -> &VoteTally {
        &self.votes
    }

    pub fn voted(&self) -> &BTreeSet<VoterId> {
        &self.voted
    }

    pub fn post(&self, post_id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == *post_id)
    }

    pub fn candidate(&self, candidate_id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == *candidate_id)
    }

    pub fn voter(&self, voter_id: &VoterId) -> Option<&Voter> {
        self.voters.iter().find(|v| v.id == *voter_id)
    }

    /// The candidates of a post, in registration order.
    pub fn candidates_for_post<'a>(
        &'a self,
        post_id: &'a PostId,
    ) -> impl Iterator<Item = &'a Candidate> + 'a {
        self.candidates.iter().filter(move |c| c.post_id == *post_id)
    }

    /// The recorded count for a candidate, zero if nobody voted for them.
    pub fn count(&self, post_id: &PostId, candidate_id: &CandidateId) -> VoteCount {
        self.votes
            .get(post_id)
            .and_then(|m| m.get(candidate_id))
            .cloned()
            .unwrap_or(VoteCount::EMPTY)
    }

    /// Number of registered voters that are in the voted set.
    ///
    /// Voters deleted after casting a ballot are not counted.
    pub fn registered_voters_who_voted(&self) -> usize {
        self.voters
            .iter()
            .filter(|v| self.voted.contains(&v.id))
            .count()
    }

    // ********* Administration ***********

    pub fn add_post(&mut self, title: &str, description: &str) -> Result<Post, ElectionError> {
        let now = Utc::now();
        let post = Post::new(PostId(self.peek_id(now)?), title, description, now)?;
        self.commit_id(now)?;
        info!("Added post {}: {}", post.id, post.title);
        self.posts.push(post.clone());
        Ok(post)
    }

    pub fn add_candidate(
        &mut self,
        post_id: &PostId,
        profile: CandidateProfile,
    ) -> Result<Candidate, ElectionError> {
        if self.post(post_id).is_none() {
            return Err(ElectionError::UnknownPost(post_id.clone()));
        }
        let now = Utc::now();
        let candidate = Candidate::new(
            CandidateId(self.peek_id(now)?),
            post_id.clone(),
            profile,
            now,
        )?;
        self.commit_id(now)?;
        info!(
            "Added candidate {}: {} for post {}",
            candidate.id, candidate.name, candidate.post_id
        );
        self.candidates.push(candidate.clone());
        Ok(candidate)
    }

    /// Removes a candidate together with the votes recorded for them.
    pub fn delete_candidate(&mut self, candidate_id: &CandidateId) -> Result<Candidate, ElectionError> {
        let idx = self
            .candidates
            .iter()
            .position(|c| c.id == *candidate_id)
            .ok_or_else(|| ElectionError::UnknownCandidate(candidate_id.clone()))?;
        let candidate = self.candidates.remove(idx);
        if let Some(counts) = self.votes.get_mut(&candidate.post_id) {
            if let Some(c) = counts.remove(candidate_id) {
                info!(
                    "delete_candidate: discarding {} vote(s) for candidate {}",
                    c, candidate_id
                );
            }
            if counts.is_empty() {
                self.votes.remove(&candidate.post_id);
            }
        }
        info!("Deleted candidate {}: {}", candidate.id, candidate.name);
        Ok(candidate)
    }

    pub fn add_voter(&mut self, registration: VoterRegistration) -> Result<Voter, ElectionError> {
        if self
            .voters
            .iter()
            .any(|v| v.student_code == registration.student_code)
        {
            return Err(ElectionError::DuplicateStudentCode(registration.student_code));
        }
        let now = Utc::now();
        let voter = Voter::new(VoterId(self.peek_id(now)?), registration, now)?;
        self.commit_id(now)?;
        info!("Registered voter {}: {}", voter.id, voter.student_code);
        self.voters.push(voter.clone());
        Ok(voter)
    }

    /// Removes a voter record. The voted set is left as is: a ballot that was
    /// already cast stays counted.
    pub fn delete_voter(&mut self, voter_id: &VoterId) -> Result<Voter, ElectionError> {
        let idx = self
            .voters
            .iter()
            .position(|v| v.id == *voter_id)
            .ok_or_else(|| ElectionError::UnknownVoter(voter_id.clone()))?;
        let voter = self.voters.remove(idx);
        info!("Deleted voter {}: {}", voter.id, voter.student_code);
        Ok(voter)
    }

    pub(crate) fn remove_post(&mut self, post_id: &PostId) -> Result<Post, ElectionError> {
        let idx = self
            .posts
            .iter()
            .position(|p| p.id == *post_id)
            .ok_or_else(|| ElectionError::UnknownPost(post_id.clone()))?;
        let post = self.posts.remove(idx);
        let before = self.candidates.len();
        self.candidates.retain(|c| c.post_id != *post_id);
        let removed_votes: VoteCount = self
            .votes
            .remove(post_id)
            .map(|m| m.into_values().sum())
            .unwrap_or(VoteCount::EMPTY);
        info!(
            "Deleted post {}: {} ({} candidate(s), {} vote(s) removed)",
            post.id,
            post.title,
            before - self.candidates.len(),
            removed_votes
        );
        Ok(post)
    }

    // Ids are the creation time in milliseconds, bumped when two records are
    // created within the same millisecond.
    fn peek_id(&self, now: DateTime<Utc>) -> Result<String, ElectionError> {
        Ok(self.id_for(now)?.to_string())
    }

    fn commit_id(&mut self, now: DateTime<Utc>) -> Result<(), ElectionError> {
        self.last_id = self.id_for(now)?;
        Ok(())
    }

    fn id_for(&self, now: DateTime<Utc>) -> Result<u64, ElectionError> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let next = self
            .last_id
            .checked_add(1)
            .ok_or(ElectionError::IdsExhausted)?;
        Ok(millis.max(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn registration(code: &str) -> VoterRegistration {
        VoterRegistration {
            name: format!("Student {}", code),
            student_code: code.to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn ids_are_unique_within_a_burst() {
        init();
        let mut store = ElectionStore::default();
        let mut ids: HashSet<String> = HashSet::new();
        for i in 0..50 {
            let p = store.add_post(&format!("Post {}", i), "").unwrap();
            assert!(ids.insert(p.id.0));
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        init();
        let mut store = ElectionStore::default();
        assert_eq!(
            store.add_post("   ", "desc"),
            Err(ElectionError::MissingField("title"))
        );
        assert!(store.posts().is_empty());
    }

    #[test]
    fn candidate_needs_existing_post() {
        init();
        let mut store = ElectionStore::default();
        let res = store.add_candidate(&PostId::from("nope"), CandidateProfile::named("Anna"));
        assert_eq!(res, Err(ElectionError::UnknownPost(PostId::from("nope"))));
    }

    #[test]
    fn duplicate_student_code_is_rejected() {
        init();
        let mut store = ElectionStore::default();
        store.add_voter(registration("S1")).unwrap();
        assert_eq!(
            store.add_voter(registration("S1")),
            Err(ElectionError::DuplicateStudentCode("S1".to_string()))
        );
        assert_eq!(store.voters().len(), 1);
    }

    #[test]
    fn deleting_candidate_drops_their_votes() {
        init();
        let mut store = ElectionStore::default();
        let post = store.add_post("President", "").unwrap();
        let a = store
            .add_candidate(&post.id, CandidateProfile::named("A"))
            .unwrap();
        let b = store
            .add_candidate(&post.id, CandidateProfile::named("B"))
            .unwrap();
        store
            .votes
            .entry(post.id.clone())
            .or_default()
            .insert(a.id.clone(), VoteCount(3));
        store
            .votes
            .entry(post.id.clone())
            .or_default()
            .insert(b.id.clone(), VoteCount(1));

        store.delete_candidate(&a.id).unwrap();
        assert_eq!(store.count(&post.id, &a.id), VoteCount::EMPTY);
        assert_eq!(store.count(&post.id, &b.id), VoteCount(1));
        assert_eq!(store.candidates_for_post(&post.id).count(), 1);
    }

    #[test]
    fn from_parts_drops_orphans() {
        init();
        let now = Utc::now();
        let post = Post::new(PostId::from("1"), "President", "", now).unwrap();
        let a = Candidate::new(
            CandidateId::from("2"),
            post.id.clone(),
            CandidateProfile::named("A"),
            now,
        )
        .unwrap();
        let stray = Candidate::new(
            CandidateId::from("3"),
            PostId::from("99"),
            CandidateProfile::named("Stray"),
            now,
        )
        .unwrap();
        let mut votes: VoteTally = BTreeMap::new();
        votes
            .entry(post.id.clone())
            .or_default()
            .insert(a.id.clone(), VoteCount(2));
        votes
            .entry(post.id.clone())
            .or_default()
            .insert(CandidateId::from("3"), VoteCount(5));
        votes
            .entry(PostId::from("99"))
            .or_default()
            .insert(CandidateId::from("3"), VoteCount(1));

        let store = ElectionStore::from_parts(
            AdminCredentials::default(),
            vec![post.clone()],
            vec![a.clone(), stray],
            vec![],
            votes,
            BTreeSet::new(),
        );
        assert_eq!(store.candidates(), &[a.clone()]);
        assert_eq!(store.votes().len(), 1);
        assert_eq!(store.count(&post.id, &a.id), VoteCount(2));

        // New ids continue after the loaded ones.
        let mut store = store;
        let p2 = store.add_post("Treasurer", "").unwrap();
        assert!(p2.id.0.parse::<u64>().unwrap() > 3);
    }

    #[test]
    fn largest_numeric_id_does_not_overflow() {
        init();
        let now = Utc::now();
        let post = Post::new(PostId(u64::MAX.to_string()), "President", "", now).unwrap();
        let mut store = ElectionStore::from_parts(
            AdminCredentials::default(),
            vec![post],
            vec![],
            vec![],
            BTreeMap::new(),
            BTreeSet::new(),
        );
        assert_eq!(
            store.add_post("Treasurer", ""),
            Err(ElectionError::IdsExhausted)
        );
        assert_eq!(
            store.add_voter(registration("S1")),
            Err(ElectionError::IdsExhausted)
        );
        assert_eq!(store.posts().len(), 1);
        assert!(store.voters().is_empty());
    }

    #[test]
    fn deleted_voter_stays_in_voted_set() {
        init();
        let mut store = ElectionStore::default();
        let v = store.add_voter(registration("S1")).unwrap();
        store.voted.insert(v.id.clone());
        store.delete_voter(&v.id).unwrap();
        assert!(store.voted().contains(&v.id));
        assert_eq!(store.registered_voters_who_voted(), 0);
    }
}
