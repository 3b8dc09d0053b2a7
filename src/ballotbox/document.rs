// The election document, as saved on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::ballotbox::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    pub username: String,
    pub password: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    pub name: String,
    #[serde(default)]
    pub slogan: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub video: String,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "studentCode")]
    pub student_code: String,
    pub password: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// The whole state of an election. There is no schema version: the layout is
/// fixed.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub admin: AdminRecord,
    #[serde(default)]
    pub posts: Vec<PostRecord>,
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
    #[serde(default)]
    pub voters: Vec<VoterRecord>,
    #[serde(default)]
    pub votes: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(rename = "votedStudents", default)]
    pub voted_students: Vec<String>,
}

impl From<&Post> for PostRecord {
    fn from(p: &Post) -> Self {
        PostRecord {
            id: p.id.0.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            created_at: p.created_at,
        }
    }
}

impl From<&Candidate> for CandidateRecord {
    fn from(c: &Candidate) -> Self {
        CandidateRecord {
            id: c.id.0.clone(),
            post_id: c.post_id.0.clone(),
            name: c.name.clone(),
            slogan: c.slogan.clone(),
            image: c.image.clone(),
            video: c.video.clone(),
            bio: c.bio.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<&Voter> for VoterRecord {
    fn from(v: &Voter) -> Self {
        VoterRecord {
            id: v.id.0.clone(),
            name: v.name.clone(),
            student_code: v.student_code.clone(),
            password: v.password.clone(),
            created_at: v.created_at,
        }
    }
}

impl StoreDocument {
    pub fn from_store(store: &ElectionStore) -> StoreDocument {
        StoreDocument {
            admin: AdminRecord {
                username: store.admin().username.clone(),
                password: store.admin().password.clone(),
            },
            posts: store.posts().iter().map(PostRecord::from).collect(),
            candidates: store.candidates().iter().map(CandidateRecord::from).collect(),
            voters: store.voters().iter().map(VoterRecord::from).collect(),
            votes: store
                .votes()
                .iter()
                .map(|(pid, counts)| {
                    (
                        pid.0.clone(),
                        counts.iter().map(|(cid, vc)| (cid.0.clone(), vc.0)).collect(),
                    )
                })
                .collect(),
            voted_students: store.voted().iter().map(|v| v.0.clone()).collect(),
        }
    }

    /// Checks every record and assembles the store.
    pub fn into_store(self) -> BallotBoxResult<ElectionStore> {
        let mut posts: Vec<Post> = Vec::new();
        for p in self.posts {
            let post = Post::new(PostId(p.id), &p.title, &p.description, p.created_at)
                .context(InvalidRecordSnafu { kind: "post" })?;
            posts.push(post);
        }
        let mut candidates: Vec<Candidate> = Vec::new();
        for c in self.candidates {
            let profile = CandidateProfile {
                name: c.name,
                slogan: c.slogan,
                bio: c.bio,
                image: c.image,
                video: c.video,
            };
            let candidate =
                Candidate::new(CandidateId(c.id), PostId(c.post_id), profile, c.created_at)
                    .context(InvalidRecordSnafu { kind: "candidate" })?;
            candidates.push(candidate);
        }
        let mut voters: Vec<Voter> = Vec::new();
        for v in self.voters {
            let registration = VoterRegistration {
                name: v.name,
                student_code: v.student_code,
                password: v.password,
            };
            let voter = Voter::new(VoterId(v.id), registration, v.created_at)
                .context(InvalidRecordSnafu { kind: "voter" })?;
            voters.push(voter);
        }
        let votes: VoteTally = self
            .votes
            .into_iter()
            .map(|(pid, counts)| {
                (
                    PostId(pid),
                    counts
                        .into_iter()
                        .map(|(cid, n)| (CandidateId(cid), VoteCount(n)))
                        .collect(),
                )
            })
            .collect();
        let voted: BTreeSet<VoterId> = self.voted_students.into_iter().map(VoterId).collect();

        Ok(ElectionStore::from_parts(
            AdminCredentials {
                username: self.admin.username,
                password: self.admin.password,
            },
            posts,
            candidates,
            voters,
            votes,
            voted,
        ))
    }
}

pub fn load_store(path: &str) -> BallotBoxResult<ElectionStore> {
    ensure!(
        Path::new(path).exists(),
        MissingStoreSnafu {
            path: path.to_string()
        }
    );
    let contents = fs::read_to_string(path).context(ReadingFileSnafu {
        path: path.to_string(),
    })?;
    let doc: StoreDocument = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: path.to_string(),
    })?;
    debug!(
        "load_store: {}: {} posts, {} candidates, {} voters",
        path,
        doc.posts.len(),
        doc.candidates.len(),
        doc.voters.len()
    );
    doc.into_store()
}

/// Writes the whole document at once: the content goes to a temporary file
/// that then replaces the previous document.
pub fn save_store(path: &str, store: &ElectionStore) -> BallotBoxResult<()> {
    let doc = StoreDocument::from_store(store);
    let contents = serde_json::to_string_pretty(&doc).context(SerializingJsonSnafu {})?;
    let tmp_path = format!("{}.tmp", path);
    fs::write(&tmp_path, contents).context(WritingFileSnafu {
        path: tmp_path.clone(),
    })?;
    fs::rename(&tmp_path, path).context(WritingFileSnafu {
        path: path.to_string(),
    })?;
    debug!("save_store: wrote {}", path);
    Ok(())
}

/// Exclusive access to an election document for the duration of a command.
///
/// The lock is a `<store>.lock` file next to the document, created only if it
/// does not exist yet, and removed when the guard is dropped.
#[derive(Debug)]
pub struct StoreLock {
    path: String,
}

impl StoreLock {
    pub fn acquire(store_path: &str) -> BallotBoxResult<StoreLock> {
        let path = format!("{}.lock", store_path);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("StoreLock: acquired {}", path);
                Ok(StoreLock { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                StoreLockedSnafu { path }.fail()
            }
            Err(e) => Err(e).context(WritingFileSnafu { path }),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("StoreLock: could not remove {}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use election_ledger::ledger::Ledger;

    fn temp_path(name: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("ballotbox-{}-{}.json", name, std::process::id()));
        p.display().to_string()
    }

    #[test]
    fn save_then_load() {
        let mut store = ElectionStore::default();
        let post = store.add_post("President", "Leads").unwrap();
        let a = store
            .add_candidate(
                &post.id,
                CandidateProfile {
                    name: "Anna".to_string(),
                    slogan: "Forward".to_string(),
                    bio: "".to_string(),
                    image: "data:image/png;base64,AAAA".to_string(),
                    video: "".to_string(),
                },
            )
            .unwrap();
        let voter = store
            .add_voter(VoterRegistration {
                name: "Ben".to_string(),
                student_code: "S1".to_string(),
                password: "pw".to_string(),
            })
            .unwrap();
        let ballot: Ballot = [(post.id.clone(), a.id.clone())].into_iter().collect();
        Ledger::new(&mut store, &ElectionRules::DEFAULT_RULES)
            .submit_ballot(&voter.id, &ballot)
            .unwrap();

        let path = temp_path("roundtrip");
        save_store(&path, &store).unwrap();
        let loaded = load_store(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(StoreDocument::from_store(&loaded), StoreDocument::from_store(&store));
        assert_eq!(loaded.count(&post.id, &a.id), VoteCount(1));
        assert!(loaded.voted().contains(&voter.id));
    }

    #[test]
    fn reads_browser_layout() {
        let js = r#"{
            "admin": {"username": "admin", "password": "admin123"},
            "posts": [{"id": "1700000000000", "title": "President", "description": "", "createdAt": "2023-11-14T22:13:20.000Z"}],
            "candidates": [
                {"id": "1700000000001", "postId": "1700000000000", "name": "A", "slogan": "", "image": "", "video": "", "bio": "", "createdAt": "2023-11-14T22:13:20.001Z"},
                {"id": "1700000000002", "postId": "1700000000000", "name": "B", "slogan": "", "createdAt": "2023-11-14T22:13:20.002Z"}
            ],
            "voters": [{"id": "1700000000003", "name": "V", "studentCode": "S1", "password": "pw", "createdAt": "2023-11-14T22:13:20.003Z"}],
            "votes": {"1700000000000": {"1700000000001": 2, "deleted-candidate": 4}},
            "votedStudents": ["1700000000003"]
        }"#;
        let doc: StoreDocument = serde_json::from_str(js).unwrap();
        let store = doc.into_store().unwrap();
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.candidates().len(), 2);
        assert_eq!(store.candidates()[1].image, "");
        let pid = PostId::from("1700000000000");
        assert_eq!(store.count(&pid, &CandidateId::from("1700000000001")), VoteCount(2));
        // The orphan count is not carried over.
        assert_eq!(store.votes()[&pid].len(), 1);
        assert!(store.voted().contains(&VoterId::from("1700000000003")));
    }

    #[test]
    fn blank_required_field_is_an_error() {
        let js = r#"{
            "admin": {"username": "admin", "password": "admin123"},
            "posts": [{"id": "1", "title": "", "createdAt": "2023-11-14T22:13:20.000Z"}]
        }"#;
        let doc: StoreDocument = serde_json::from_str(js).unwrap();
        assert!(matches!(
            doc.into_store(),
            Err(BallotBoxError::InvalidRecord { kind: "post", .. })
        ));
    }

    #[test]
    fn one_writer_at_a_time() {
        let path = temp_path("locked");
        let first = StoreLock::acquire(&path).unwrap();
        assert!(matches!(
            StoreLock::acquire(&path),
            Err(BallotBoxError::StoreLocked { .. })
        ));
        drop(first);
        let again = StoreLock::acquire(&path).unwrap();
        drop(again);
        assert!(!Path::new(&format!("{}.lock", path)).exists());
    }

    #[test]
    fn missing_document() {
        let path = temp_path("missing");
        assert!(matches!(
            load_store(&path),
            Err(BallotBoxError::MissingStore { .. })
        ));
    }
}
