// ********* Identifiers ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};

/// The identifier of a post (an electable position).
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct PostId(pub String);

/// The identifier of a candidate. A candidate belongs to exactly one post.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub String);

/// The identifier of a registered voter. This is not the student code.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VoterId(pub String);

impl Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        PostId(s.to_string())
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        CandidateId(s.to_string())
    }
}

impl From<&str> for VoterId {
    fn from(s: &str) -> Self {
        VoterId(s.to_string())
    }
}

// ********* Records ***********

fn require_field(field: &'static str, value: &str) -> Result<(), ElectionError> {
    if value.trim().is_empty() {
        Err(ElectionError::MissingField(field))
    } else {
        Ok(())
    }
}

/// The single administrator account.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        AdminCredentials {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        id: PostId,
        title: &str,
        description: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Post, ElectionError> {
        require_field("title", title)?;
        Ok(Post {
            id,
            title: title.to_string(),
            description: description.to_string(),
            created_at,
        })
    }
}

/// What an administrator fills in when registering a candidate.
///
/// The image and video references are opaque to the ledger: they may be URLs
/// or inline data URLs.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CandidateProfile {
    pub name: String,
    pub slogan: String,
    pub bio: String,
    pub image: String,
    pub video: String,
}

impl CandidateProfile {
    /// A profile with only a name.
    pub fn named(name: &str) -> CandidateProfile {
        CandidateProfile {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub id: CandidateId,
    pub post_id: PostId,
    pub name: String,
    pub slogan: String,
    pub bio: String,
    pub image: String,
    pub video: String,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(
        id: CandidateId,
        post_id: PostId,
        profile: CandidateProfile,
        created_at: DateTime<Utc>,
    ) -> Result<Candidate, ElectionError> {
        require_field("postId", &post_id.0)?;
        require_field("name", &profile.name)?;
        Ok(Candidate {
            id,
            post_id,
            name: profile.name,
            slogan: profile.slogan,
            bio: profile.bio,
            image: profile.image,
            video: profile.video,
            created_at,
        })
    }
}

/// What an administrator fills in when registering a voter.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoterRegistration {
    pub name: String,
    pub student_code: String,
    pub password: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Voter {
    pub id: VoterId,
    pub name: String,
    pub student_code: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl Voter {
    pub fn new(
        id: VoterId,
        registration: VoterRegistration,
        created_at: DateTime<Utc>,
    ) -> Result<Voter, ElectionError> {
        require_field("name", &registration.name)?;
        require_field("studentCode", &registration.student_code)?;
        require_field("password", &registration.password)?;
        Ok(Voter {
            id,
            name: registration.name,
            student_code: registration.student_code,
            password: registration.password,
            created_at,
        })
    }
}

// ********* Votes ***********

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Default)]
pub struct VoteCount(pub u64);

impl VoteCount {
    pub const EMPTY: VoteCount = VoteCount(0);
    pub const ONE: VoteCount = VoteCount(1);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

impl Display for VoteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vote counts per post, then per candidate.
///
/// Invariant (maintained by the store): a candidate only appears under the
/// post it belongs to.
pub type VoteTally = BTreeMap<PostId, BTreeMap<CandidateId, VoteCount>>;

/// The choices of one voter: at most one candidate per post.
///
/// A ballot is assembled before submission and is never persisted as such.
/// Only its effect on the tally is recorded.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Ballot {
    choices: BTreeMap<PostId, CandidateId>,
}

impl Ballot {
    pub fn new() -> Ballot {
        Ballot::default()
    }

    /// Sets the choice for a post, returning the previous choice if any.
    pub fn choose(&mut self, post_id: PostId, candidate_id: CandidateId) -> Option<CandidateId> {
        self.choices.insert(post_id, candidate_id)
    }

    pub fn withdraw(&mut self, post_id: &PostId) -> Option<CandidateId> {
        self.choices.remove(post_id)
    }

    pub fn choice(&self, post_id: &PostId) -> Option<&CandidateId> {
        self.choices.get(post_id)
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PostId, &CandidateId)> {
        self.choices.iter()
    }
}

impl FromIterator<(PostId, CandidateId)> for Ballot {
    fn from_iter<I: IntoIterator<Item = (PostId, CandidateId)>>(iter: I) -> Self {
        Ballot {
            choices: iter.into_iter().collect(),
        }
    }
}

// ******** Errors *********

/// Errors returned by the election operations.
///
/// None of them is fatal: the state is left unchanged and the caller may retry
/// with corrected input.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ElectionError {
    /// A required field was left blank.
    MissingField(&'static str),
    /// Another voter is already registered with this student code.
    DuplicateStudentCode(String),
    UnknownPost(PostId),
    UnknownCandidate(CandidateId),
    UnknownVoter(VoterId),
    /// The voter is already in the voted set.
    AlreadyVoted(VoterId),
    /// The ballot is inconsistent with the registered posts and candidates.
    /// Nothing from it has been recorded.
    InvalidBallot(String),
    /// The largest numeric id is already taken: no new record can be created.
    IdsExhausted,
}

impl Error for ElectionError {}

impl Display for ElectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionError::MissingField(field) => write!(f, "missing required field: {}", field),
            ElectionError::DuplicateStudentCode(code) => {
                write!(f, "student code already exists: {}", code)
            }
            ElectionError::UnknownPost(id) => write!(f, "no post with id {}", id),
            ElectionError::UnknownCandidate(id) => write!(f, "no candidate with id {}", id),
            ElectionError::UnknownVoter(id) => write!(f, "no voter with id {}", id),
            ElectionError::AlreadyVoted(id) => write!(f, "voter {} has already voted", id),
            ElectionError::InvalidBallot(reason) => write!(f, "invalid ballot: {}", reason),
            ElectionError::IdsExhausted => write!(f, "no identifier left for a new record"),
        }
    }
}

// ********* Configuration **********

/// How to choose the leading candidate when several share the highest count.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// The first tied candidate in registration order leads.
    UseCandidateOrder,
    /// The tied candidates are ordered by a cryptographic hash of the seed and
    /// their id. The outcome is hard to guess in advance but reproducible.
    Random(u32),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionRules {
    pub tiebreak_mode: TieBreakMode,
    /// If set, a ballot must hold a choice for every post that has candidates.
    pub require_complete_ballot: bool,
    /// A race with more than one candidate is competitive when the margin
    /// between the first two is at most this many votes.
    pub competitive_margin: u64,
}

impl ElectionRules {
    pub const DEFAULT_RULES: ElectionRules = ElectionRules {
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
        require_complete_ballot: false,
        competitive_margin: 2,
    };
}

impl Default for ElectionRules {
    fn default() -> Self {
        ElectionRules::DEFAULT_RULES
    }
}
