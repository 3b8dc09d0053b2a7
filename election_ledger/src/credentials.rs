use log::{debug, warn};

use crate::config::*;
use crate::store::ElectionStore;

/// Outcome of a voter login attempt.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VoterLogin {
    Accepted(Voter),
    /// The credentials match but this voter has already cast a ballot.
    AlreadyVoted,
    /// No voter has this student code and password.
    NotFound,
}

/// Read-only credential checks against the store.
///
/// A failed check is final: there is no retry or lockout logic here, the user
/// simply has to enter correct credentials.
pub struct CredentialStore<'a> {
    store: &'a ElectionStore,
}

impl<'a> CredentialStore<'a> {
    pub fn new(store: &'a ElectionStore) -> CredentialStore<'a> {
        CredentialStore { store }
    }

    pub fn verify_admin(&self, username: &str, password: &str) -> bool {
        let admin = self.store.admin();
        let ok = admin.username == username && admin.password == password;
        if !ok {
            warn!("verify_admin: rejected login for {:?}", username);
        }
        ok
    }

    pub fn verify_voter(&self, student_code: &str, password: &str) -> VoterLogin {
        let found = self
            .store
            .voters()
            .iter()
            .find(|v| v.student_code == student_code && v.password == password);
        match found {
            None => {
                warn!("verify_voter: no match for student code {:?}", student_code);
                VoterLogin::NotFound
            }
            Some(v) if self.store.voted().contains(&v.id) => {
                warn!("verify_voter: voter {} has already voted", v.id);
                VoterLogin::AlreadyVoted
            }
            Some(v) => {
                debug!("verify_voter: accepted voter {}", v.id);
                VoterLogin::Accepted(v.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;

    fn store_with_voter() -> (ElectionStore, Voter) {
        let mut store = ElectionStore::new(AdminCredentials {
            username: "principal".to_string(),
            password: "hunter2".to_string(),
        });
        let voter = store
            .add_voter(VoterRegistration {
                name: "Ada".to_string(),
                student_code: "S-001".to_string(),
                password: "pw".to_string(),
            })
            .unwrap();
        (store, voter)
    }

    #[test]
    fn admin_needs_exact_match() {
        let (store, _) = store_with_voter();
        let creds = CredentialStore::new(&store);
        assert!(creds.verify_admin("principal", "hunter2"));
        assert!(!creds.verify_admin("principal", "hunter"));
        assert!(!creds.verify_admin("Principal", "hunter2"));
        assert!(!creds.verify_admin("admin", "admin123"));
    }

    #[test]
    fn voter_login_outcomes() {
        let (mut store, voter) = store_with_voter();
        {
            let creds = CredentialStore::new(&store);
            assert_eq!(
                creds.verify_voter("S-001", "pw"),
                VoterLogin::Accepted(voter.clone())
            );
            assert_eq!(creds.verify_voter("S-001", "wrong"), VoterLogin::NotFound);
            assert_eq!(creds.verify_voter("S-002", "pw"), VoterLogin::NotFound);
        }

        let post = store.add_post("President", "").unwrap();
        let a = store
            .add_candidate(&post.id, CandidateProfile::named("A"))
            .unwrap();
        let rules = ElectionRules::DEFAULT_RULES;
        let ballot: Ballot = [(post.id.clone(), a.id.clone())].into_iter().collect();
        Ledger::new(&mut store, &rules)
            .submit_ballot(&voter.id, &ballot)
            .unwrap();

        let creds = CredentialStore::new(&store);
        assert_eq!(creds.verify_voter("S-001", "pw"), VoterLogin::AlreadyVoted);
        // Wrong password still reads as not found, not as already voted.
        assert_eq!(creds.verify_voter("S-001", "nope"), VoterLogin::NotFound);
    }
}
