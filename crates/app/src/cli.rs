use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quiz_core::model::{Grade, Subject};
use services::settings::DEFAULT_QUESTIONS_PER_SESSION;
use services::{DEFAULT_HISTORY_LIMIT, DEFAULT_LEADERBOARD_SIZE};

#[derive(Debug, Parser)]
#[command(name = "quiz")]
#[command(about = "Practice quizzes for primary school subjects")]
#[command(version)]
pub struct Cli {
    /// SQLite database URL
    #[arg(long = "db", env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    pub db_url: String,

    /// Keep everything in memory for this run only
    #[arg(long)]
    pub guest: bool,

    /// Directory holding `<Subject>_<Grade>.json` question files
    #[arg(long, env = "QUIZ_BANK_DIR", default_value = "data")]
    pub bank: PathBuf,

    /// Learner ID (ignored with --guest)
    #[arg(long, env = "QUIZ_USER_ID", default_value = "learner")]
    pub user: String,

    /// Questions per session
    #[arg(long, default_value_t = DEFAULT_QUESTIONS_PER_SESSION)]
    pub questions: u32,

    /// Ask questions in bank order
    #[arg(long)]
    pub no_shuffle: bool,

    /// Maximum games per subject per day
    #[arg(long)]
    pub daily_limit: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play one quiz session
    Play {
        /// English, Math, Science or Chinese
        #[arg(short, long)]
        subject: Subject,
        /// Primary 3 or Primary 4 (defaults to the profile's grade)
        #[arg(short, long)]
        grade: Option<Grade>,
        /// Display name used when creating a new profile
        #[arg(long)]
        name: Option<String>,
    },
    /// Show (and optionally update) the learner profile
    Profile {
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New grade
        #[arg(long)]
        grade: Option<Grade>,
    },
    /// Show the top learners by total points
    Leaderboard {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_SIZE)]
        limit: u32,
    },
    /// Show recent results
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Check every question file in the bank
    Validate,
}
