#![forbid(unsafe_code)]

mod cli;
mod play;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use quiz_core::model::{Grade, UserId};
use services::{AppServices, Clock, SessionSettings};
use storage::JsonQuestionBank;
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::play::{Console, PlayEnd};

const DEFAULT_LEARNER_NAME: &str = "Learner";
const GUEST_NAME: &str = "Guest Scholar";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let bank = JsonQuestionBank::new(&cli.bank);
    if matches!(cli.command, Command::Validate) {
        return validate(&bank).await;
    }

    let settings = SessionSettings::new(cli.questions, !cli.no_shuffle, cli.daily_limit)?;
    let clock = Clock::default();
    let questions = Arc::new(bank);

    let (services, user_id) = if cli.guest {
        info!("guest mode: progress is kept in memory only");
        (
            AppServices::in_memory(clock, settings, questions),
            UserId::guest(),
        )
    } else {
        let db_url = normalize_sqlite_url(&cli.db_url);
        prepare_sqlite_file(&db_url)?;
        debug!(%db_url, "opening database");
        let services = AppServices::new_sqlite(&db_url, clock, settings, questions)
            .await
            .with_context(|| format!("failed to open {db_url}"))?;
        (services, UserId::new(cli.user.as_str())?)
    };

    match cli.command {
        Command::Play {
            subject,
            grade,
            name,
        } => {
            let default_name = if cli.guest {
                GUEST_NAME
            } else {
                DEFAULT_LEARNER_NAME
            };
            let name = name.as_deref().unwrap_or(default_name);
            let profile = services
                .profiles()
                .load_or_create(&user_id, name, grade.unwrap_or(Grade::Primary3))
                .await?;
            let grade = grade.unwrap_or(profile.grade());

            let quiz = services.quiz_loop();
            let session = quiz.start_session(&user_id, subject, grade).await?;
            let mut console = Console::new(BufReader::new(tokio::io::stdin()), io::stdout());
            let end = play::run_session(&quiz, &user_id, session, &mut console).await?;

            let out = console.output();
            match end {
                PlayEnd::Saved(outcome) => {
                    writeln!(
                        out,
                        "\nSaved: {} of {} points. Total {} points, {}-day streak.",
                        outcome.final_score,
                        outcome.total_questions * quiz_core::scoring::POINTS_PER_CORRECT,
                        outcome.total_points,
                        outcome.streak
                    )?;
                }
                PlayEnd::Unsaved { final_score } => {
                    writeln!(out, "\nScore {final_score} was not saved.")?;
                }
                PlayEnd::Abandoned => writeln!(out, "\nSession abandoned. Nothing was saved.")?,
                PlayEnd::Unavailable => {}
            }
        }
        Command::Profile { name, grade } => {
            let profiles = services.profiles();
            if name.is_some() || grade.is_some() {
                profiles
                    .update_details(&user_id, name.as_deref(), grade)
                    .await?;
            }
            let overview = profiles.overview(&user_id).await?;
            let profile = &overview.profile;
            let mut out = io::stdout().lock();
            writeln!(out, "{} ({})", profile.name(), profile.user_id())?;
            writeln!(out, "Grade:        {}", profile.grade())?;
            writeln!(out, "Points:       {}", profile.total_points())?;
            writeln!(out, "Games played: {}", overview.games_played)?;
            writeln!(
                out,
                "Streak:       {} day(s){}",
                overview.streak,
                if overview.played_today {
                    ""
                } else {
                    ", play today to keep it going"
                }
            )?;
        }
        Command::Leaderboard { limit } => {
            let board = services.results().leaderboard(limit).await?;
            let mut out = io::stdout().lock();
            if board.is_empty() {
                writeln!(out, "No learners yet.")?;
            }
            for entry in board {
                writeln!(
                    out,
                    "{:>3}. {:<20} {:<10} {:>6}",
                    entry.rank, entry.name, entry.grade, entry.total_points
                )?;
            }
        }
        Command::History { limit } => {
            let rows = services.results().history(&user_id, limit).await?;
            let mut out = io::stdout().lock();
            if rows.is_empty() {
                writeln!(out, "No games played yet.")?;
            }
            for row in rows {
                let result = &row.result;
                writeln!(
                    out,
                    "{}  {:<8} {:<10} {:>3}/{:<3} ({} correct)",
                    result.recorded_at().format("%Y-%m-%d %H:%M"),
                    result.subject(),
                    result.grade(),
                    result.score(),
                    result.total_questions() * quiz_core::scoring::POINTS_PER_CORRECT,
                    result.correct_answers()
                )?;
            }
        }
        // answered above without opening storage
        Command::Validate => {}
    }

    Ok(())
}

async fn validate(bank: &JsonQuestionBank) -> Result<()> {
    let reports = bank
        .validate_bank()
        .await
        .with_context(|| format!("failed to read {}", bank.root().display()))?;
    let mut out = io::stdout().lock();
    let mut issues = 0usize;
    for report in &reports {
        let status = if report.is_clean() { "ok" } else { "issues" };
        writeln!(
            out,
            "{}: {} question(s), {status}",
            report.file_name, report.total
        )?;
        if report.catalog.is_none() {
            writeln!(out, "  not a <Subject>_<Grade>.json file name")?;
        }
        for issue in &report.issues {
            writeln!(out, "  {issue}")?;
        }
        issues += report.issues.len();
    }
    if issues > 0 {
        bail!("{issues} issue(s) found in {} file(s)", reports.len());
    }
    Ok(())
}

/// Accepts `sqlite://…`, `sqlite:path` or a bare path and returns an absolute `sqlite://` URL.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| ".".into())
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its parent directory if missing.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("unsupported database URL: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("database URL has no path: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}
