/*!
Vote recording and results for school elections.

An election is held in an [`store::ElectionStore`]: the administrator account,
the posts (electable positions), their candidates, the registered voters, the
vote tally and the set of voters who have already voted. Three views borrow
the store:

- [`credentials::CredentialStore`] checks admin and voter logins,
- [`ledger::Ledger`] records ballots, at most one per voter, and can reset or
  delete a post,
- [`results::ResultsAggregator`] turns the tally into per-post results, with
  margins, participation rates, rankings and insights.

```
use election_ledger::credentials::{CredentialStore, VoterLogin};
use election_ledger::ledger::Ledger;
use election_ledger::results::{margin, ResultsAggregator};
use election_ledger::store::ElectionStore;
use election_ledger::*;

let rules = ElectionRules::DEFAULT_RULES;
let mut store = ElectionStore::default();
let president = store.add_post("President", "")?;
let alice = store.add_candidate(&president.id, CandidateProfile::named("Alice"))?;
store.add_candidate(&president.id, CandidateProfile::named("Bob"))?;
store.add_voter(VoterRegistration {
    name: "Carol".to_string(),
    student_code: "S-042".to_string(),
    password: "pw".to_string(),
})?;

let voter = match CredentialStore::new(&store).verify_voter("S-042", "pw") {
    VoterLogin::Accepted(v) => v,
    other => panic!("unexpected login outcome {:?}", other),
};
let ballot: Ballot = [(president.id.clone(), alice.id.clone())].into_iter().collect();
Ledger::new(&mut store, &rules).submit_ballot(&voter.id, &ballot)?;

let results = ResultsAggregator::new(&store, &rules).compute_results();
assert_eq!(results[0].leading_candidate.as_ref().map(|c| c.name.as_str()), Some("Alice"));
assert_eq!(margin(&results[0]), 1);
# Ok::<(), ElectionError>(())
```
*/

mod config;

pub mod builder;
pub mod credentials;
pub mod ledger;
pub mod results;
pub mod store;

pub use crate::config::*;
