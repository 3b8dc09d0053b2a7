//! Turning the flat vote tally into per-post results and the analytics
//! derived from them.
//!
//! [`ResultsAggregator::compute_results`] is the only function that reads the
//! tally. Everything else in this module is a pure function of its output.

use log::debug;

use std::fmt::Display;

use crate::config::*;
use crate::store::ElectionStore;

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub votes: VoteCount,
}

/// The outcome for one post.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PostResult {
    pub post: Post,
    /// Every candidate of the post, including those without votes, in
    /// registration order.
    pub candidates: Vec<CandidateResult>,
    pub total_votes: VoteCount,
    /// None when no vote has been cast for this post.
    pub leading_candidate: Option<Candidate>,
    pub leading_votes: VoteCount,
}

impl PostResult {
    /// The candidates sorted by decreasing votes. Equal counts keep their
    /// registration order.
    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut res: Vec<&CandidateResult> = self.candidates.iter().collect();
        res.sort_by(|a, b| b.votes.cmp(&a.votes));
        res
    }
}

/// A candidate placed in the cross-post leaderboard.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateRanking {
    /// 1-based.
    pub rank: usize,
    pub candidate: Candidate,
    /// The title of the post the candidate runs for.
    pub position: String,
    pub votes: VoteCount,
    /// Percentage of the votes cast for that post.
    pub share: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionSummary {
    pub total_votes: VoteCount,
    /// Percentage of registered voters who have cast a ballot.
    pub voter_turnout: u64,
    pub active_positions: usize,
    pub total_candidates: usize,
    pub voted_students: usize,
    pub registered_voters: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ParticipationLevel {
    High,
    Moderate,
    Low,
}

impl ParticipationLevel {
    pub fn from_turnout(turnout: u64) -> ParticipationLevel {
        if turnout > 80 {
            ParticipationLevel::High
        } else if turnout > 50 {
            ParticipationLevel::Moderate
        } else {
            ParticipationLevel::Low
        }
    }
}

/// Observations about the election as a whole.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Insight {
    Participation {
        level: ParticipationLevel,
        turnout: u64,
    },
    /// Number of posts whose race is close.
    CompetitiveRaces(usize),
    /// Number of posts where at most one candidate received votes.
    UnopposedRaces(usize),
}

impl Insight {
    pub fn title(&self) -> &'static str {
        match self {
            Insight::Participation {
                level: ParticipationLevel::High,
                ..
            } => "High Voter Engagement",
            Insight::Participation {
                level: ParticipationLevel::Moderate,
                ..
            } => "Moderate Participation",
            Insight::Participation {
                level: ParticipationLevel::Low,
                ..
            } => "Low Participation",
            Insight::CompetitiveRaces(_) => "Competitive Elections",
            Insight::UnopposedRaces(_) => "Unopposed Positions",
        }
    }
}

impl Display for Insight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Insight::Participation {
                level: ParticipationLevel::High,
                turnout,
            } => write!(
                f,
                "Excellent turnout with {}% of registered voters participating.",
                turnout
            ),
            Insight::Participation {
                level: ParticipationLevel::Moderate,
                turnout,
            } => write!(
                f,
                "{}% voter turnout indicates room for improvement in engagement.",
                turnout
            ),
            Insight::Participation {
                level: ParticipationLevel::Low,
                turnout,
            } => write!(
                f,
                "Only {}% turnout suggests need for increased voter outreach.",
                turnout
            ),
            Insight::CompetitiveRaces(n) => write!(
                f,
                "{} position(s) have very close margins, indicating strong competition.",
                n
            ),
            Insight::UnopposedRaces(n) => write!(
                f,
                "{} position(s) have clear winners or limited competition.",
                n
            ),
        }
    }
}

// ******** Aggregation *********

pub struct ResultsAggregator<'a> {
    store: &'a ElectionStore,
    rules: &'a ElectionRules,
}

impl<'a> ResultsAggregator<'a> {
    pub fn new(store: &'a ElectionStore, rules: &'a ElectionRules) -> ResultsAggregator<'a> {
        ResultsAggregator { store, rules }
    }

    /// One result per post, in post order.
    pub fn compute_results(&self) -> Vec<PostResult> {
        self.store
            .posts()
            .iter()
            .map(|post| {
                let candidates: Vec<CandidateResult> = self
                    .store
                    .candidates_for_post(&post.id)
                    .map(|c| CandidateResult {
                        candidate: c.clone(),
                        votes: self.store.count(&post.id, &c.id),
                    })
                    .collect();
                let total_votes: VoteCount = candidates.iter().map(|c| c.votes).sum();
                let leader = find_leader(&candidates, self.rules.tiebreak_mode);
                debug!(
                    "compute_results: post {}: {} vote(s), leader {:?}",
                    post.id,
                    total_votes,
                    leader.map(|c| &c.candidate.name)
                );
                PostResult {
                    post: post.clone(),
                    total_votes,
                    leading_candidate: leader.map(|c| c.candidate.clone()),
                    leading_votes: leader.map(|c| c.votes).unwrap_or(VoteCount::EMPTY),
                    candidates,
                }
            })
            .collect()
    }

    pub fn summary(&self, results: &[PostResult]) -> ElectionSummary {
        let registered_voters = self.store.voters().len();
        let voted_students = self.store.registered_voters_who_voted();
        ElectionSummary {
            total_votes: results.iter().map(|r| r.total_votes).sum(),
            voter_turnout: rounded_percentage(voted_students as u64, registered_voters as u64),
            active_positions: self.store.posts().len(),
            total_candidates: self.store.candidates().len(),
            voted_students,
            registered_voters,
        }
    }

    /// The participation insight always comes first. The race insights are
    /// only present when at least one post qualifies.
    pub fn insights(&self, results: &[PostResult]) -> Vec<Insight> {
        let turnout = self.summary(results).voter_turnout;
        let mut res = vec![Insight::Participation {
            level: ParticipationLevel::from_turnout(turnout),
            turnout,
        }];
        let competitive = results
            .iter()
            .filter(|r| is_competitive(r, self.rules.competitive_margin))
            .count();
        if competitive > 0 {
            res.push(Insight::CompetitiveRaces(competitive));
        }
        let unopposed = results.iter().filter(|r| is_unopposed(r)).count();
        if unopposed > 0 {
            res.push(Insight::UnopposedRaces(unopposed));
        }
        res
    }
}

// The leader needs strictly more votes than zero. Among the candidates sharing
// the maximum, the tiebreak mode decides.
fn find_leader(candidates: &[CandidateResult], tiebreak: TieBreakMode) -> Option<&CandidateResult> {
    let max_votes = candidates.iter().map(|c| c.votes).max()?;
    if max_votes == VoteCount::EMPTY {
        return None;
    }
    let tied: Vec<&CandidateResult> = candidates.iter().filter(|c| c.votes == max_votes).collect();
    if tied.len() > 1 {
        debug!(
            "find_leader: {} candidates tied at {} vote(s), using {:?}",
            tied.len(),
            max_votes,
            tiebreak
        );
    }
    match tiebreak {
        TieBreakMode::UseCandidateOrder => tied.first().cloned(),
        TieBreakMode::Random(seed) => tied
            .into_iter()
            .min_by_key(|c| tiebreak_digest(seed, &c.candidate.id)),
    }
}

/// A hash of the seed and the candidate id. Sorting on it gives an order that
/// cannot be guessed without the seed, and that does not depend on
/// registration order.
fn tiebreak_digest(seed: u32, candidate_id: &CandidateId) -> String {
    let data = format!("{:08}{}", seed, candidate_id);
    sha256::digest(data.as_str())
}

/// `round(part / whole * 100)`, with halves rounded up. Zero when `whole` is 0.
pub fn rounded_percentage(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        0
    } else {
        let (part, whole) = (part as u128, whole as u128);
        u64::try_from((part * 200 + whole) / (2 * whole)).unwrap_or(u64::MAX)
    }
}

/// Share of the registered voters that voted for this post.
pub fn participation_rate(result: &PostResult, total_voters: usize) -> u64 {
    rounded_percentage(result.total_votes.0, total_voters as u64)
}

/// Share of the votes of a post.
pub fn vote_share(votes: VoteCount, total: VoteCount) -> u64 {
    rounded_percentage(votes.0, total.0)
}

/// Votes between the first and the second candidate. With a single candidate,
/// this is the count of that candidate.
pub fn margin(result: &PostResult) -> u64 {
    match result.ranked().as_slice() {
        [] => 0,
        [leader] => leader.votes.0,
        [leader, runner_up, ..] => leader.votes.0 - runner_up.votes.0,
    }
}

/// More than one candidate and a margin of at most `threshold` votes.
///
/// A post whose candidates all have zero votes counts as competitive.
pub fn is_competitive(result: &PostResult, threshold: u64) -> bool {
    result.candidates.len() > 1 && margin(result) <= threshold
}

/// At most one candidate has received votes.
pub fn is_unopposed(result: &PostResult) -> bool {
    result
        .candidates
        .iter()
        .filter(|c| c.votes > VoteCount::EMPTY)
        .count()
        <= 1
}

/// All the candidates of all the posts, by decreasing votes.
///
/// Candidates with the same count keep post order, then registration order.
pub fn candidate_rankings(results: &[PostResult], limit: Option<usize>) -> Vec<CandidateRanking> {
    let mut all: Vec<(&PostResult, &CandidateResult)> = results
        .iter()
        .flat_map(|r| r.candidates.iter().map(move |c| (r, c)))
        .collect();
    all.sort_by(|(_, a), (_, b)| b.votes.cmp(&a.votes));
    all.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(idx, (r, c))| CandidateRanking {
            rank: idx + 1,
            candidate: c.candidate.clone(),
            position: r.post.title.clone(),
            votes: c.votes,
            share: vote_share(c.votes, r.total_votes),
        })
        .collect()
}
