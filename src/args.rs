use clap::{Parser, Subcommand};

/// This is an administration and voting program for school elections.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, default ballotbox.json) The election document. It holds the admin account, the posts,
    /// candidates and voters, and the recorded votes.
    #[clap(short, long, value_parser, global = true)]
    pub store: Option<String>,

    /// (file path, optional) A JSON file with the election rules (tiebreak mode, complete ballots, competitive
    /// margin). The default rules are used if not provided.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Creates a new, empty election document.
    Init {
        /// (default admin)
        #[clap(long, value_parser)]
        admin_username: Option<String>,
        /// (default admin123)
        #[clap(long, value_parser)]
        admin_password: Option<String>,
        /// Overwrite an existing document.
        #[clap(long, takes_value = false)]
        force: bool,
    },
    /// Adds a post (an electable position).
    AddPost {
        #[clap(long, value_parser)]
        title: String,
        #[clap(long, value_parser, default_value = "")]
        description: String,
    },
    /// Deletes a post with its candidates and its votes.
    DeletePost {
        #[clap(value_parser)]
        post_id: String,
    },
    /// Registers a candidate for a post.
    AddCandidate {
        /// The id of the post.
        #[clap(long, value_parser)]
        post: String,
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser, default_value = "")]
        slogan: String,
        #[clap(long, value_parser, default_value = "")]
        bio: String,
        /// (URL or data URL, optional)
        #[clap(long, value_parser, default_value = "")]
        image: String,
        /// (URL or data URL, optional)
        #[clap(long, value_parser, default_value = "")]
        video: String,
    },
    /// Deletes a candidate and the votes they received.
    DeleteCandidate {
        #[clap(value_parser)]
        candidate_id: String,
    },
    /// Registers a voter. Student codes must be unique.
    AddVoter {
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        student_code: String,
        #[clap(long, value_parser)]
        password: String,
    },
    /// Deletes a voter. A ballot they already cast stays counted.
    DeleteVoter {
        #[clap(value_parser)]
        voter_id: String,
    },
    /// Lists the posts, candidates and voters.
    List,
    /// Checks the admin credentials.
    LoginAdmin {
        #[clap(long, value_parser)]
        username: String,
        #[clap(long, value_parser)]
        password: String,
    },
    /// Checks the credentials of a voter and whether they may still vote.
    LoginVoter {
        #[clap(long, value_parser)]
        student_code: String,
        #[clap(long, value_parser)]
        password: String,
    },
    /// Casts the ballot of a voter. This can only be done once per voter.
    Vote {
        #[clap(long, value_parser)]
        student_code: String,
        #[clap(long, value_parser)]
        password: String,
        /// (POST_ID=CANDIDATE_ID, repeated) One choice per post.
        #[clap(long = "choice", value_parser)]
        choices: Vec<String>,
    },
    /// Prints the results of every post.
    Results {
        /// Print the results in JSON format instead of text.
        #[clap(long, takes_value = false)]
        json: bool,
    },
    /// Exports the analytics report in JSON format.
    Report {
        /// (file path, 'stdout' or empty) Where to write the report.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference report. If provided, ballotbox will check that the report matches it,
        /// ignoring the generation time.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Discards all the votes. This cannot be undone and requires the admin password.
    Reset {
        #[clap(long, value_parser, default_value = "admin")]
        admin_username: String,
        #[clap(long, value_parser)]
        admin_password: String,
    },
}
