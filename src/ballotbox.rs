use log::{debug, info, warn};

use election_ledger::builder::Builder;
use election_ledger::credentials::{CredentialStore, VoterLogin};
use election_ledger::ledger::Ledger;
use election_ledger::results::*;
use election_ledger::store::ElectionStore;
use election_ledger::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;

use crate::args::{Args, Command};
use crate::ballotbox::config_reader::*;
use crate::ballotbox::document::*;
use crate::ballotbox::report::*;

mod document;
mod report;

pub const DEFAULT_STORE_PATH: &str = "ballotbox.json";

#[derive(Debug, Snafu)]
pub enum BallotBoxError {
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing to JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("No election document at {path}: create one with the init command"))]
    MissingStore { path: String },
    #[snafu(display("An election document already exists at {path} (use --force to replace it)"))]
    StoreExists { path: String },
    #[snafu(display("Invalid {kind} record in the election document"))]
    InvalidRecord {
        source: ElectionError,
        kind: &'static str,
    },
    #[snafu(display("{source}"))]
    Election { source: ElectionError },
    #[snafu(display("Invalid admin credentials"))]
    InvalidAdminCredentials {},
    #[snafu(display("Invalid student code or password"))]
    InvalidStudentCredentials {},
    #[snafu(display("This student has already voted"))]
    StudentAlreadyVoted {},
    #[snafu(display("Cannot understand choice {choice:?}: expected POST_ID=CANDIDATE_ID"))]
    ParsingChoice { choice: String },
    #[snafu(display(
        "Another ballotbox command holds {path}: wait for it, or delete the file if no command is running"
    ))]
    StoreLocked { path: String },
    #[snafu(display("Difference detected between the report and the reference report {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type BallotBoxResult<T> = Result<T, BallotBoxError>;

pub mod config_reader {
    use crate::ballotbox::*;

    /// The election rules, as written in the configuration file.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
    pub struct RulesConfig {
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: Option<String>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
        #[serde(rename = "requireCompleteBallot")]
        pub require_complete_ballot: Option<bool>,
        #[serde(rename = "competitiveMargin")]
        pub competitive_margin: Option<u64>,
    }

    pub fn read_rules(path: &str) -> BallotBoxResult<RulesConfig> {
        let contents = fs::read_to_string(path).context(ReadingFileSnafu {
            path: path.to_string(),
        })?;
        debug!("read_rules: {:?}", contents);
        let config: RulesConfig = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {
            path: path.to_string(),
        })?;
        Ok(config)
    }

    pub fn validate_rules(config: &RulesConfig) -> BallotBoxResult<ElectionRules> {
        let defaults = ElectionRules::DEFAULT_RULES;
        let res = ElectionRules {
            tiebreak_mode: match config.tiebreak_mode.as_deref() {
                None | Some("useCandidateOrder") => TieBreakMode::UseCandidateOrder,
                Some("random") => {
                    let seed = match config.random_seed.clone().map(|s| s.parse::<u32>()) {
                        Some(Result::Ok(x)) => x,
                        x => {
                            whatever!("Tiebreak mode random requires a numeric randomSeed, got {:?}", x)
                        }
                    };
                    TieBreakMode::Random(seed)
                }
                Some(x) => {
                    whatever!("Cannot use tiebreak mode {:?}: currently not implemented", x)
                }
            },
            require_complete_ballot: config
                .require_complete_ballot
                .unwrap_or(defaults.require_complete_ballot),
            competitive_margin: config
                .competitive_margin
                .unwrap_or(defaults.competitive_margin),
        };
        Ok(res)
    }
}

fn load_rules(args: &Args) -> BallotBoxResult<ElectionRules> {
    match &args.config {
        Some(path) => {
            let config = read_rules(path)?;
            info!("rules config: {:?}", config);
            validate_rules(&config)
        }
        None => Ok(ElectionRules::DEFAULT_RULES),
    }
}

/// Reads a POST_ID=CANDIDATE_ID pair.
fn parse_choice(choice: &str) -> BallotBoxResult<(PostId, CandidateId)> {
    match choice.split_once('=') {
        Some((p, c)) if !p.trim().is_empty() && !c.trim().is_empty() => {
            Ok((PostId::from(p.trim()), CandidateId::from(c.trim())))
        }
        _ => ParsingChoiceSnafu { choice }.fail(),
    }
}

fn login_voter(store: &ElectionStore, student_code: &str, password: &str) -> BallotBoxResult<Voter> {
    match CredentialStore::new(store).verify_voter(student_code, password) {
        VoterLogin::Accepted(v) => Ok(v),
        VoterLogin::AlreadyVoted => StudentAlreadyVotedSnafu {}.fail(),
        VoterLogin::NotFound => InvalidStudentCredentialsSnafu {}.fail(),
    }
}

fn cast_vote(
    store: &mut ElectionStore,
    rules: &ElectionRules,
    student_code: &str,
    password: &str,
    choices: &[String],
) -> BallotBoxResult<Voter> {
    let voter = login_voter(store, student_code, password)?;
    let ballot = {
        let mut builder = Builder::new(store);
        for choice in choices {
            let (post_id, candidate_id) = parse_choice(choice)?;
            if builder.ballot().choice(&post_id).is_some() {
                whatever!("Post {} appears more than once on the ballot", post_id);
            }
            let selection = builder.select(&post_id, &candidate_id).context(ElectionSnafu {})?;
            debug!("cast_vote: {} -> {}: {:?}", post_id, candidate_id, selection);
        }
        let progress = builder.progress();
        info!(
            "cast_vote: voter {} chose in {}/{} posts ({:.0}%)",
            voter.id, progress.voted, progress.total, progress.percentage
        );
        builder.build()
    };
    Ledger::new(store, rules)
        .submit_ballot(&voter.id, &ballot)
        .context(ElectionSnafu {})?;
    Ok(voter)
}

fn print_results(store: &ElectionStore, rules: &ElectionRules, as_json: bool) -> BallotBoxResult<()> {
    let results = ResultsAggregator::new(store, rules).compute_results();
    if as_json {
        let js: Vec<JSValue> = results.iter().map(post_result_to_json).collect();
        let pretty = serde_json::to_string_pretty(&js).context(SerializingJsonSnafu {})?;
        println!("{}", pretty);
        return Ok(());
    }
    let total_voters = store.voters().len();
    for r in results.iter() {
        println!("{} ({} votes)", r.post.title, r.total_votes);
        for cr in r.ranked() {
            println!(
                "    {:<30} {:>6} {:>4}%",
                cr.candidate.name,
                cr.votes.0,
                vote_share(cr.votes, r.total_votes)
            );
        }
        match &r.leading_candidate {
            Some(c) => println!("  leading: {} with {} votes", c.name, r.leading_votes),
            None => println!("  leading: no votes yet"),
        }
        let mut flags: Vec<&str> = Vec::new();
        if is_competitive(r, rules.competitive_margin) {
            flags.push("competitive");
        }
        if is_unopposed(r) {
            flags.push("unopposed");
        }
        println!(
            "  margin: {}  participation: {}%  {}",
            margin(r),
            participation_rate(r, total_voters),
            flags.join(", ")
        );
    }
    Ok(())
}

fn print_listing(store: &ElectionStore) {
    println!("Posts:");
    for p in store.posts() {
        println!("  {}  {}  {}", p.id, p.title, p.description);
        for c in store.candidates_for_post(&p.id) {
            println!("      {}  {}  {}", c.id, c.name, c.slogan);
        }
    }
    println!("Voters:");
    for v in store.voters() {
        let status = if store.voted().contains(&v.id) {
            "voted"
        } else {
            "not voted"
        };
        println!("  {}  {}  {}  ({})", v.id, v.student_code, v.name, status);
    }
}

fn write_report(report: &JSValue, out: &Option<String>) -> BallotBoxResult<()> {
    let pretty = serde_json::to_string_pretty(report).context(SerializingJsonSnafu {})?;
    match out.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty),
        Some(path) => {
            fs::write(path, pretty).context(WritingFileSnafu {
                path: path.to_string(),
            })?;
            info!("write_report: report written to {}", path);
        }
    }
    Ok(())
}

pub fn run(args: &Args) -> BallotBoxResult<()> {
    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string());
    let rules = load_rules(args)?;
    debug!("run: store {} rules {:?}", store_path, rules);
    let _lock = StoreLock::acquire(&store_path)?;

    if let Command::Init {
        admin_username,
        admin_password,
        force,
    } = &args.command
    {
        ensure!(
            *force || !Path::new(&store_path).exists(),
            StoreExistsSnafu {
                path: store_path.clone()
            }
        );
        let defaults = AdminCredentials::default();
        let store = ElectionStore::new(AdminCredentials {
            username: admin_username.clone().unwrap_or(defaults.username),
            password: admin_password.clone().unwrap_or(defaults.password),
        });
        save_store(&store_path, &store)?;
        println!("Created election document {}", store_path);
        return Ok(());
    }

    let mut store = load_store(&store_path)?;
    let modified = match &args.command {
        Command::Init { .. } => false,
        Command::AddPost { title, description } => {
            let post = store.add_post(title, description).context(ElectionSnafu {})?;
            println!("Added post {} ({})", post.id, post.title);
            true
        }
        Command::DeletePost { post_id } => {
            let post = Ledger::new(&mut store, &rules)
                .delete_post(&PostId::from(post_id.as_str()))
                .context(ElectionSnafu {})?;
            println!("Deleted post {} ({})", post.id, post.title);
            true
        }
        Command::AddCandidate {
            post,
            name,
            slogan,
            bio,
            image,
            video,
        } => {
            let profile = CandidateProfile {
                name: name.clone(),
                slogan: slogan.clone(),
                bio: bio.clone(),
                image: image.clone(),
                video: video.clone(),
            };
            let c = store
                .add_candidate(&PostId::from(post.as_str()), profile)
                .context(ElectionSnafu {})?;
            println!("Added candidate {} ({})", c.id, c.name);
            true
        }
        Command::DeleteCandidate { candidate_id } => {
            let c = store
                .delete_candidate(&CandidateId::from(candidate_id.as_str()))
                .context(ElectionSnafu {})?;
            println!("Deleted candidate {} ({})", c.id, c.name);
            true
        }
        Command::AddVoter {
            name,
            student_code,
            password,
        } => {
            let v = store
                .add_voter(VoterRegistration {
                    name: name.clone(),
                    student_code: student_code.clone(),
                    password: password.clone(),
                })
                .context(ElectionSnafu {})?;
            println!("Added voter {} ({})", v.id, v.student_code);
            true
        }
        Command::DeleteVoter { voter_id } => {
            let v = store
                .delete_voter(&VoterId::from(voter_id.as_str()))
                .context(ElectionSnafu {})?;
            println!("Deleted voter {} ({})", v.id, v.student_code);
            true
        }
        Command::List => {
            print_listing(&store);
            false
        }
        Command::LoginAdmin { username, password } => {
            ensure!(
                CredentialStore::new(&store).verify_admin(username, password),
                InvalidAdminCredentialsSnafu {}
            );
            println!("Admin credentials accepted");
            false
        }
        Command::LoginVoter {
            student_code,
            password,
        } => {
            let v = login_voter(&store, student_code, password)?;
            println!("Welcome {}: you may vote", v.name);
            false
        }
        Command::Vote {
            student_code,
            password,
            choices,
        } => {
            let v = cast_vote(&mut store, &rules, student_code, password, choices)?;
            println!("Thank you {}: your vote has been recorded", v.name);
            true
        }
        Command::Results { json } => {
            print_results(&store, &rules, *json)?;
            false
        }
        Command::Report { out, reference } => {
            let report = build_report(&store, &rules, chrono::Utc::now());
            write_report(&report, out)?;
            if let Some(ref_path) = reference {
                compare_with_reference(&report, ref_path)?;
            }
            false
        }
        Command::Reset {
            admin_username,
            admin_password,
        } => {
            ensure!(
                CredentialStore::new(&store).verify_admin(admin_username, admin_password),
                InvalidAdminCredentialsSnafu {}
            );
            warn!("run: resetting all the votes in {}", store_path);
            Ledger::new(&mut store, &rules).reset_all();
            println!("All votes have been reset");
            true
        }
    };

    if modified {
        save_store(&store_path, &store)?;
    }
    Ok(())
}
