use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "episodic",
    version,
    about = "Browse a series catalog, resume where you left off and track what you watched"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Some(Command::Tui) | None)
    }
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Catalog JSON document
    #[arg(long, global = true, env = "EPISODIC_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// SQLite database holding resume points and the local history log
    #[arg(long, global = true, env = "EPISODIC_DB")]
    pub database: Option<PathBuf>,

    /// Viewing user; history is only read and written when set
    #[arg(long, global = true, env = "EPISODIC_USER")]
    pub user: Option<String>,

    /// Base URL of a REST history store (local database when absent)
    #[arg(long, global = true, env = "EPISODIC_HISTORY_URL")]
    pub history_url: Option<String>,

    #[arg(long, global = true, env = "EPISODIC_HISTORY_TOKEN", hide_env_values = true)]
    pub history_token: Option<String>,

    /// Seconds an episode must stay open before it counts as watched
    #[arg(long, global = true, env = "EPISODIC_DWELL_SECS")]
    pub dwell_secs: Option<u64>,

    /// Initial audio language of a playback session
    #[arg(long, global = true, env = "EPISODIC_LANGUAGE")]
    pub language: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open a series and print what the player would show
    Play {
        series: String,
        #[arg(long)]
        season: Option<String>,
        /// Zero-based episode index within the season
        #[arg(long, requires = "season")]
        episode: Option<usize>,
        /// Show the season grid instead of resuming
        #[arg(long, conflicts_with = "season")]
        grid: bool,
    },
    /// Play a random episode of a series
    Random { series: String },
    /// Open a movie
    Movie { id: String },
    /// Show per-season progress for a series
    Progress { series: String },
    /// List watch history, newest first
    History,
    /// Remove one history entry by key
    Forget { key: String },
    Tui,
}
