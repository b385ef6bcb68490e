//! Interactive terminal loop for one quiz session.

use std::io::Write;

use anyhow::{Context, Result};
use quiz_core::model::{OPTION_COUNT, UserId};
use quiz_core::quiz::{PassMode, Phase, SessionState};
use quiz_core::scoring;
use services::{QuizLoopService, SessionController, SessionError, SessionOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// How a played session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayEnd {
    Saved(SessionOutcome),
    /// The score was shown but could not be stored.
    Unsaved { final_score: u32 },
    Abandoned,
    Unavailable,
}

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Reads one trimmed, lowercased line. `None` on end of input.
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .await
            .context("failed to read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_ascii_lowercase()))
    }
}

fn render_question(out: &mut impl Write, session: &SessionState) -> Result<()> {
    let label = match session.mode() {
        PassMode::Primary => "Question",
        PassMode::Retry => "Retry",
    };
    let question = session.current_question();
    writeln!(out)?;
    writeln!(
        out,
        "{label} {}/{}  (score {})",
        session.current_index() + 1,
        session.len(),
        session.score()
    )?;
    writeln!(out, "{}", question.question_text())?;
    for (i, option) in question.options().iter().enumerate() {
        writeln!(out, "  {}. {option}", i + 1)?;
    }
    Ok(())
}

fn render_feedback(out: &mut impl Write, session: &SessionState, selected: usize) -> Result<()> {
    let question = session.current_question();
    let evaluation = scoring::evaluate(question, selected);
    if evaluation.correct {
        writeln!(out, "Correct! +{}", evaluation.points_awarded)?;
    } else {
        writeln!(
            out,
            "Not quite. The answer is {}. {}",
            question.correct_answer_index() + 1,
            question.correct_option()
        )?;
    }
    if let Some(explanation) = session.revealed_explanation().filter(|e| !e.is_empty()) {
        writeln!(out, "{explanation}")?;
    }
    Ok(())
}

fn render_result(out: &mut impl Write, session: &SessionState) -> Result<()> {
    let tally = session.tally();
    writeln!(out)?;
    writeln!(
        out,
        "Pass complete: {} correct, {} wrong, score {}/{}",
        tally.correct,
        tally.incorrect,
        session.score(),
        scoring::max_score(session.len())
    )?;
    if let Some(initial) = session.initial_score() {
        if session.mode() == PassMode::Retry {
            writeln!(out, "Your recorded score stays {initial}.")?;
        }
    }
    Ok(())
}

/// Play `session` until the learner finishes or quits, then persist.
///
/// # Errors
///
/// Returns an error on I/O failures or unexpected session errors.
pub async fn run_session<R, W>(
    quiz: &QuizLoopService,
    user_id: &UserId,
    mut session: SessionController,
    console: &mut Console<R, W>,
) -> Result<PlayEnd>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if session.ensure_available().is_err() {
        writeln!(
            console.output,
            "No questions are available for {} {} right now.",
            session.subject(),
            session.grade()
        )?;
        return Ok(PlayEnd::Unavailable);
    }

    loop {
        let phase = session.phase();
        let Some(state) = session.session() else {
            break;
        };
        match phase {
            Phase::Playing => {
                render_question(&mut console.output, state)?;
                if let Some(selected) = state.current_answer() {
                    render_feedback(&mut console.output, state, selected)?;
                    match console.ask("[enter] next, [b] back, [q] quit:").await?.as_deref() {
                        None | Some("q") => {
                            session.abandon();
                            return Ok(PlayEnd::Abandoned);
                        }
                        Some("b") => {
                            if let Err(err) = session.back() {
                                writeln!(console.output, "{err}")?;
                            }
                        }
                        Some(_) => {
                            session.advance()?;
                        }
                    }
                } else {
                    let prompt = format!("Answer 1-{OPTION_COUNT}, [b] back, [q] quit:");
                    match console.ask(&prompt).await?.as_deref() {
                        None | Some("q") => {
                            session.abandon();
                            return Ok(PlayEnd::Abandoned);
                        }
                        Some("b") => {
                            if let Err(err) = session.back() {
                                writeln!(console.output, "{err}")?;
                            }
                        }
                        Some(raw) => match raw.parse::<usize>() {
                            Ok(n) if (1..=OPTION_COUNT).contains(&n) => {
                                session.select_option(n - 1)?;
                            }
                            _ => writeln!(console.output, "Please choose 1-{OPTION_COUNT}.")?,
                        },
                    }
                }
            }
            Phase::Result => {
                render_result(&mut console.output, state)?;
                let can_retry = !state.wrong_indices().is_empty();
                let prompt = if can_retry {
                    "[r] retry missed, [f] finish, [q] quit without saving:"
                } else {
                    "[f] finish, [q] quit without saving:"
                };
                match console.ask(prompt).await?.as_deref() {
                    None | Some("q") => {
                        session.abandon();
                        return Ok(PlayEnd::Abandoned);
                    }
                    Some("r") if can_retry => session.retry()?,
                    Some("f" | "") => break,
                    Some(_) => {}
                }
            }
            _ => break,
        }
    }

    loop {
        match quiz.finish_session(user_id, &mut session).await {
            Ok(outcome) => return Ok(PlayEnd::Saved(outcome)),
            Err(SessionError::PersistenceFailure {
                final_score,
                source,
            }) => {
                writeln!(
                    console.output,
                    "Your score of {final_score} could not be saved: {source}"
                )?;
                if console.ask("[t] try again, [q] quit:").await?.as_deref() != Some("t") {
                    return Ok(PlayEnd::Unsaved { final_score });
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}
