use chrono::{DateTime, Utc};
use std::fmt;
use std::mem;
use tracing::debug;

use quiz_core::model::{GameResultId, Grade, Question, Subject};
use quiz_core::quiz::{FinishedSession, Phase, QuizAction, QuizState, Rejected, SessionState};
use quiz_core::scoring::Evaluation;

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ANSWER FEEDBACK ───────────────────────────────────────────────────────────
//

/// What the learner sees right after picking an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub evaluation: Evaluation,
    pub selected: usize,
    pub correct_answer_index: usize,
    pub explanation: String,
    /// Running score of the current pass.
    pub score: u32,
}

/// Which persistence steps of a finished session already succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PersistProgress {
    pub(crate) result_id: Option<GameResultId>,
    pub(crate) total_points: Option<u64>,
    pub(crate) date_recorded: bool,
}

//
// ─── SESSION CONTROLLER ────────────────────────────────────────────────────────
//

/// Drives one quiz session for a subject and grade.
///
/// Owns the [`QuizState`] and feeds it actions; rejected actions leave the
/// state as it was and surface as [`SessionError::InvalidTransition`].
pub struct SessionController {
    subject: Subject,
    grade: Grade,
    state: QuizState,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    persisted: PersistProgress,
}

impl SessionController {
    /// A controller waiting for questions.
    ///
    /// `started_at` should come from the services layer clock to keep time deterministic.
    #[must_use]
    pub fn new(subject: Subject, grade: Grade, started_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            grade,
            state: QuizState::Loading,
            started_at,
            completed_at: None,
            persisted: PersistProgress::default(),
        }
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn grade(&self) -> Grade {
        self.grade
    }

    #[must_use]
    pub fn state(&self) -> &QuizState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionState> {
        self.state.session()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match &self.state {
            QuizState::Playing(session) => Some(session.current_question()),
            _ => None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn finished(&self) -> Option<FinishedSession> {
        self.state.finished()
    }

    /// ID of the stored result once persistence succeeded.
    #[must_use]
    pub fn result_id(&self) -> Option<GameResultId> {
        self.persisted.result_id
    }

    /// True once every persistence step for the finished session succeeded.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted.result_id.is_some()
            && self.persisted.total_points.is_some()
            && self.persisted.date_recorded
    }

    /// Returns a summary of the current pass, or `None` outside `Playing`/`Result`.
    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let session = self.state.session()?;
        let tally = session.tally();
        let answered = tally.correct + tally.incorrect;
        Some(SessionProgress {
            mode: session.mode(),
            position: session.current_index(),
            total: session.len(),
            answered,
            remaining: session.len().saturating_sub(answered),
            score: session.score(),
            is_complete: self.phase() == Phase::Result,
        })
    }

    /// Fails with `QuestionSourceUnavailable` when there is nothing to play.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionSourceUnavailable` in the `Unavailable` phase.
    pub fn ensure_available(&self) -> Result<(), SessionError> {
        if self.phase() == Phase::Unavailable {
            return Err(SessionError::QuestionSourceUnavailable {
                subject: self.subject,
                grade: self.grade,
            });
        }
        Ok(())
    }

    /// Load questions. An empty list moves to `Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is loading.
    pub fn start(&mut self, questions: Vec<Question>) -> Result<Phase, SessionError> {
        self.dispatch(QuizAction::Start(questions))?;
        Ok(self.phase())
    }

    /// Record that the question source failed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is loading.
    pub fn source_failed(&mut self) -> Result<(), SessionError> {
        self.dispatch(QuizAction::SourceFailed)
    }

    /// Answer the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if not playing, if the
    /// question is already answered, or if `option` is out of range.
    pub fn select_option(&mut self, option: usize) -> Result<AnswerFeedback, SessionError> {
        self.dispatch(QuizAction::Select(option))?;
        let session = self.state.session().ok_or(SessionError::NotFinished)?;
        let question = session.current_question();
        let evaluation = session
            .current_evaluation()
            .ok_or(SessionError::NotFinished)?;
        Ok(AnswerFeedback {
            evaluation,
            selected: option,
            correct_answer_index: question.correct_answer_index(),
            explanation: question.explanation().to_owned(),
            score: session.score(),
        })
    }

    /// Move past the answered question; returns `Phase::Result` after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if not playing or the current
    /// question is unanswered.
    pub fn advance(&mut self) -> Result<Phase, SessionError> {
        self.dispatch(QuizAction::Advance)?;
        Ok(self.phase())
    }

    /// Step back to the previous question of the current pass.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` at the first question or when not playing.
    pub fn back(&mut self) -> Result<(), SessionError> {
        self.dispatch(QuizAction::Back)
    }

    /// Replay only the questions missed in the pass just completed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `Result` or when nothing was missed.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        self.dispatch(QuizAction::Retry)
    }

    /// Close the session and return the score to report.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `Result`.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<u32, SessionError> {
        self.dispatch(QuizAction::Finish)?;
        self.completed_at = Some(at);
        self.finished()
            .map(|f| f.final_score)
            .ok_or(SessionError::NotFinished)
    }

    /// Leave early. Nothing is persisted.
    pub fn abandon(self) {
        debug!(
            subject = %self.subject,
            grade = %self.grade,
            phase = %self.phase(),
            "session abandoned"
        );
    }

    pub(crate) fn persisted(&self) -> PersistProgress {
        self.persisted
    }

    pub(crate) fn set_result_id(&mut self, id: GameResultId) {
        self.persisted.result_id = Some(id);
    }

    pub(crate) fn set_total_points(&mut self, total: u64) {
        self.persisted.total_points = Some(total);
    }

    pub(crate) fn set_date_recorded(&mut self) {
        self.persisted.date_recorded = true;
    }

    fn dispatch(&mut self, action: QuizAction) -> Result<(), SessionError> {
        let kind = action.kind();
        let state = mem::take(&mut self.state);
        match state.reduce(action) {
            Ok(next) => {
                debug!(action = %kind, phase = %next.phase(), "quiz transition");
                self.state = next;
                Ok(())
            }
            Err(Rejected { state, error }) => {
                debug!(action = %kind, phase = %state.phase(), %error, "quiz transition rejected");
                self.state = state;
                Err(error.into())
            }
        }
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("subject", &self.subject)
            .field("grade", &self.grade)
            .field("phase", &self.phase())
            .field("progress", &self.progress())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("result_id", &self.persisted.result_id)
            .finish_non_exhaustive()
    }
}
