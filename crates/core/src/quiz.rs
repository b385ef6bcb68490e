//! Quiz session state machine.
//!
//! A session is one explicit tagged state. Every user action is a
//! [`QuizAction`] and [`QuizState::reduce`] is a pure function from
//! `(state, action)` to the next state. A rejected action hands the untouched
//! state back together with the reason.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::{OPTION_COUNT, Question};
use crate::scoring::{self, Evaluation};

//
// ─── PHASES & ACTIONS ──────────────────────────────────────────────────────────
//

/// Which pass over the questions is being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// The first full run through the original list. Only its score is persisted.
    Primary,
    /// Practice run restricted to previously missed questions.
    Retry,
}

/// Payload-free view of a [`QuizState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Unavailable,
    Playing,
    Result,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Loading => "loading",
            Phase::Unavailable => "unavailable",
            Phase::Playing => "playing",
            Phase::Result => "result",
            Phase::Finished => "finished",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAction {
    /// Questions arrived from the source (possibly none).
    Start(Vec<Question>),
    /// The question source failed.
    SourceFailed,
    /// Pick an option for the current question.
    Select(usize),
    Advance,
    /// Step back to the previous question of the current pass.
    Back,
    Retry,
    Finish,
}

/// Payload-free name of a [`QuizAction`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Start,
    SourceFailed,
    Select,
    Advance,
    Back,
    Retry,
    Finish,
}

impl QuizAction {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            QuizAction::Start(_) => ActionKind::Start,
            QuizAction::SourceFailed => ActionKind::SourceFailed,
            QuizAction::Select(_) => ActionKind::Select,
            QuizAction::Advance => ActionKind::Advance,
            QuizAction::Back => ActionKind::Back,
            QuizAction::Retry => ActionKind::Retry,
            QuizAction::Finish => ActionKind::Finish,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Start => "start",
            ActionKind::SourceFailed => "source_failed",
            ActionKind::Select => "select_option",
            ActionKind::Advance => "advance",
            ActionKind::Back => "back",
            ActionKind::Retry => "retry",
            ActionKind::Finish => "finish",
        })
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Why an action was rejected. Rejections never change the state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("`{action}` is not valid while {phase}")]
    InvalidPhase { action: ActionKind, phase: Phase },

    #[error("question {index} is already answered")]
    AlreadyAnswered { index: usize },

    #[error("question {index} has not been answered yet")]
    NotAnswered { index: usize },

    #[error("option {option} is out of range")]
    OptionOutOfRange { option: usize },

    #[error("already at the first question")]
    AtFirstQuestion,

    #[error("there are no missed questions to retry")]
    NothingToRetry,
}

/// A rejected action: the original state, untouched, plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub state: QuizState,
    pub error: TransitionError,
}

impl Rejected {
    fn new(state: QuizState, error: TransitionError) -> Self {
        Self { state, error }
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Outcome of advancing past the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStep {
    Next,
    Completed,
}

/// Correct / incorrect / unanswered counts for the current pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTally {
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
}

/// Everything a session carries while `Playing` or showing its `Result`.
///
/// Invariants: `current < questions.len()`, `answers.len() == questions.len()`,
/// `wrong` only holds positions in `questions`, and `initial_score` never
/// changes once set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    questions: Vec<Question>,
    mode: PassMode,
    current: usize,
    answers: Vec<Option<usize>>,
    score: u32,
    wrong: BTreeSet<usize>,
    initial_score: Option<u32>,
    primary_total: usize,
}

impl SessionState {
    /// Returns `None` when there is nothing to play.
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        let len = questions.len();
        Some(Self {
            questions,
            mode: PassMode::Primary,
            current: 0,
            answers: vec![None; len],
            score: 0,
            wrong: BTreeSet::new(),
            initial_score: None,
            primary_total: len,
        })
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn mode(&self) -> PassMode {
        self.mode
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        // cursor is always in bounds
        &self.questions[self.current]
    }

    #[must_use]
    pub fn answer_at(&self, index: usize) -> Option<usize> {
        self.answers.get(index).copied().flatten()
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<usize> {
        self.answer_at(self.current)
    }

    #[must_use]
    pub fn is_current_answered(&self) -> bool {
        self.current_answer().is_some()
    }

    /// Evaluation of the recorded answer at the cursor, if any.
    #[must_use]
    pub fn current_evaluation(&self) -> Option<Evaluation> {
        self.current_answer()
            .map(|selected| scoring::evaluate(self.current_question(), selected))
    }

    /// The explanation is revealed once the current question is answered.
    #[must_use]
    pub fn revealed_explanation(&self) -> Option<&str> {
        self.is_current_answered()
            .then(|| self.current_question().explanation())
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    /// Score of the current pass.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Positions (in the current pass) answered incorrectly.
    #[must_use]
    pub fn wrong_indices(&self) -> &BTreeSet<usize> {
        &self.wrong
    }

    /// Score captured at the end of the primary pass.
    #[must_use]
    pub fn initial_score(&self) -> Option<u32> {
        self.initial_score
    }

    /// Number of questions in the original (primary) list.
    #[must_use]
    pub fn primary_total(&self) -> usize {
        self.primary_total
    }

    /// The score that gets reported: the primary-pass score once captured.
    #[must_use]
    pub fn final_score(&self) -> u32 {
        self.initial_score.unwrap_or(self.score)
    }

    #[must_use]
    pub fn tally(&self) -> PassTally {
        let mut tally = PassTally::default();
        for (question, answer) in self.questions.iter().zip(&self.answers) {
            match answer {
                None => tally.unanswered += 1,
                Some(selected) if scoring::evaluate(question, *selected).correct => {
                    tally.correct += 1;
                }
                Some(_) => tally.incorrect += 1,
            }
        }
        tally
    }

    fn select(&mut self, option: usize) -> Result<Evaluation, TransitionError> {
        let index = self.current;
        if option >= OPTION_COUNT {
            return Err(TransitionError::OptionOutOfRange { option });
        }
        if self.is_current_answered() {
            return Err(TransitionError::AlreadyAnswered { index });
        }
        let evaluation = scoring::evaluate(self.current_question(), option);
        self.answers[index] = Some(option);
        self.score = self.score.saturating_add(evaluation.points_awarded);
        Ok(evaluation)
    }

    fn advance(&mut self) -> Result<PassStep, TransitionError> {
        let Some(evaluation) = self.current_evaluation() else {
            return Err(TransitionError::NotAnswered {
                index: self.current,
            });
        };
        if !evaluation.correct {
            self.wrong.insert(self.current);
        }
        if self.is_last() {
            if self.mode == PassMode::Primary && self.initial_score.is_none() {
                self.initial_score = Some(self.score);
            }
            return Ok(PassStep::Completed);
        }
        self.current += 1;
        Ok(PassStep::Next)
    }

    fn back(&mut self) -> Result<(), TransitionError> {
        if self.current == 0 {
            return Err(TransitionError::AtFirstQuestion);
        }
        self.current -= 1;
        Ok(())
    }

    fn begin_retry(&mut self) -> Result<(), TransitionError> {
        if self.wrong.is_empty() {
            return Err(TransitionError::NothingToRetry);
        }
        let missed: Vec<Question> = self
            .wrong
            .iter()
            .filter_map(|&i| self.questions.get(i).cloned())
            .collect();
        self.answers = vec![None; missed.len()];
        self.questions = missed;
        self.wrong.clear();
        self.current = 0;
        self.score = 0;
        self.mode = PassMode::Retry;
        Ok(())
    }
}

//
// ─── QUIZ STATE ────────────────────────────────────────────────────────────────
//

/// Terminal payload of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedSession {
    pub final_score: u32,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QuizState {
    /// Waiting for the question source.
    #[default]
    Loading,
    /// The source failed or returned nothing. Terminal.
    Unavailable,
    Playing(SessionState),
    Result(SessionState),
    /// `finish` was accepted. Terminal.
    Finished(FinishedSession),
}

impl QuizState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            QuizState::Loading => Phase::Loading,
            QuizState::Unavailable => Phase::Unavailable,
            QuizState::Playing(_) => Phase::Playing,
            QuizState::Result(_) => Phase::Result,
            QuizState::Finished(_) => Phase::Finished,
        }
    }

    /// Session payload while playing or showing results.
    #[must_use]
    pub fn session(&self) -> Option<&SessionState> {
        match self {
            QuizState::Playing(s) | QuizState::Result(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn finished(&self) -> Option<FinishedSession> {
        match self {
            QuizState::Finished(f) => Some(*f),
            _ => None,
        }
    }

    /// Apply `action` and return the next state.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` (carrying this state unchanged) when the action is
    /// not valid in the current phase or violates a per-question rule.
    pub fn reduce(self, action: QuizAction) -> Result<QuizState, Rejected> {
        match (self, action) {
            (QuizState::Loading, QuizAction::Start(questions)) => {
                Ok(SessionState::new(questions).map_or(QuizState::Unavailable, QuizState::Playing))
            }
            (QuizState::Loading, QuizAction::SourceFailed) => Ok(QuizState::Unavailable),

            (QuizState::Playing(mut session), QuizAction::Select(option)) => {
                match session.select(option) {
                    Ok(_) => Ok(QuizState::Playing(session)),
                    Err(error) => Err(Rejected::new(QuizState::Playing(session), error)),
                }
            }
            (QuizState::Playing(mut session), QuizAction::Advance) => match session.advance() {
                Ok(PassStep::Next) => Ok(QuizState::Playing(session)),
                Ok(PassStep::Completed) => Ok(QuizState::Result(session)),
                Err(error) => Err(Rejected::new(QuizState::Playing(session), error)),
            },
            (QuizState::Playing(mut session), QuizAction::Back) => match session.back() {
                Ok(()) => Ok(QuizState::Playing(session)),
                Err(error) => Err(Rejected::new(QuizState::Playing(session), error)),
            },

            (QuizState::Result(mut session), QuizAction::Retry) => match session.begin_retry() {
                Ok(()) => Ok(QuizState::Playing(session)),
                Err(error) => Err(Rejected::new(QuizState::Result(session), error)),
            },
            (QuizState::Result(session), QuizAction::Finish) => {
                Ok(QuizState::Finished(FinishedSession {
                    final_score: session.final_score(),
                    total_questions: session.primary_total(),
                }))
            }

            (state, action) => {
                let error = TransitionError::InvalidPhase {
                    action: action.kind(),
                    phase: state.phase(),
                };
                Err(Rejected::new(state, error))
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;

    fn question(n: usize, correct: i64) -> Question {
        QuestionDraft::new(
            format!("Question {n}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
            format!("Because of {n}"),
        )
        .validate()
        .unwrap()
    }

    /// Questions whose correct answer is always option 0.
    fn questions(n: usize) -> Vec<Question> {
        (0..n).map(|i| question(i, 0)).collect()
    }

    fn playing(n: usize) -> QuizState {
        QuizState::Loading
            .reduce(QuizAction::Start(questions(n)))
            .unwrap()
    }

    fn step(state: QuizState, action: QuizAction) -> QuizState {
        state.reduce(action).unwrap()
    }

    /// Answer every remaining question of the pass; `correct(i)` picks option 0.
    fn play_pass(mut state: QuizState, correct: impl Fn(usize) -> bool) -> QuizState {
        while state.phase() == Phase::Playing {
            let index = state.session().unwrap().current_index();
            let option = if correct(index) { 0 } else { 1 };
            state = step(state, QuizAction::Select(option));
            state = step(state, QuizAction::Advance);
        }
        state
    }

    fn session(state: &QuizState) -> &SessionState {
        state.session().unwrap()
    }

    #[test]
    fn start_with_questions_begins_primary_pass() {
        let state = playing(3);
        assert_eq!(state.phase(), Phase::Playing);
        let s = session(&state);
        assert_eq!(s.mode(), PassMode::Primary);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.score(), 0);
        assert_eq!(s.initial_score(), None);
    }

    #[test]
    fn empty_start_and_source_failure_are_unavailable() {
        let state = QuizState::Loading.reduce(QuizAction::Start(Vec::new())).unwrap();
        assert_eq!(state.phase(), Phase::Unavailable);

        let state = QuizState::Loading.reduce(QuizAction::SourceFailed).unwrap();
        assert_eq!(state.phase(), Phase::Unavailable);

        let rejected = state.reduce(QuizAction::Select(0)).unwrap_err();
        assert_eq!(rejected.state, QuizState::Unavailable);
    }

    #[test]
    fn n_cycles_reach_result_with_score_per_correct_answer() {
        let state = play_pass(playing(10), |i| i % 3 == 0);
        assert_eq!(state.phase(), Phase::Result);

        let s = session(&state);
        let tally = s.tally();
        assert_eq!(tally.correct, 4);
        assert_eq!(tally.correct + tally.incorrect, 10);
        assert_eq!(tally.unanswered, 0);
        assert_eq!(s.score(), 10 * 4);
        assert_eq!(s.wrong_indices().len(), 6);
        assert_eq!(s.initial_score(), Some(40));
    }

    #[test]
    fn select_reveals_explanation() {
        let state = playing(2);
        assert_eq!(session(&state).revealed_explanation(), None);

        let state = step(state, QuizAction::Select(0));
        assert_eq!(session(&state).revealed_explanation(), Some("Because of 0"));
        assert_eq!(
            session(&state).current_evaluation(),
            Some(Evaluation {
                correct: true,
                points_awarded: 10
            })
        );
    }

    #[test]
    fn repeated_select_is_rejected_without_side_effects() {
        let state = step(playing(2), QuizAction::Select(1));
        let before = state.clone();

        let rejected = state.reduce(QuizAction::Select(0)).unwrap_err();
        assert_eq!(rejected.error, TransitionError::AlreadyAnswered { index: 0 });
        assert_eq!(rejected.state, before);
        assert_eq!(session(&rejected.state).score(), 0);
        assert!(session(&rejected.state).wrong_indices().is_empty());
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let rejected = playing(1).reduce(QuizAction::Select(OPTION_COUNT)).unwrap_err();
        assert_eq!(
            rejected.error,
            TransitionError::OptionOutOfRange {
                option: OPTION_COUNT
            }
        );
        assert!(!session(&rejected.state).is_current_answered());
    }

    #[test]
    fn advance_requires_an_answer() {
        let rejected = playing(2).reduce(QuizAction::Advance).unwrap_err();
        assert_eq!(rejected.error, TransitionError::NotAnswered { index: 0 });
    }

    #[test]
    fn retry_without_mistakes_is_a_rejected_no_op() {
        let state = play_pass(playing(3), |_| true);
        let before = state.clone();

        let rejected = state.reduce(QuizAction::Retry).unwrap_err();
        assert_eq!(rejected.error, TransitionError::NothingToRetry);
        assert_eq!(rejected.state, before);
    }

    #[test]
    fn retry_replays_only_missed_questions() {
        let state = play_pass(playing(4), |i| i == 0 || i == 2);
        let state = step(state, QuizAction::Retry);

        let s = session(&state);
        assert_eq!(state.phase(), Phase::Playing);
        assert_eq!(s.mode(), PassMode::Retry);
        assert_eq!(s.len(), 2);
        assert_eq!(s.questions()[0].question_text(), "Question 1");
        assert_eq!(s.questions()[1].question_text(), "Question 3");
        assert_eq!(s.score(), 0);
        assert!(s.wrong_indices().is_empty());
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.initial_score(), Some(20));
        assert_eq!(s.primary_total(), 4);
    }

    #[test]
    fn finish_returns_primary_score_after_perfect_retry() {
        let state = play_pass(playing(10), |i| i < 5);
        assert_eq!(session(&state).initial_score(), Some(50));

        let state = step(state, QuizAction::Retry);
        let state = play_pass(state, |_| true);
        assert_eq!(state.phase(), Phase::Result);
        assert_eq!(session(&state).score(), 50);
        assert_eq!(session(&state).mode(), PassMode::Retry);

        let state = step(state, QuizAction::Finish);
        assert_eq!(
            state.finished(),
            Some(FinishedSession {
                final_score: 50,
                total_questions: 10
            })
        );
    }

    #[test]
    fn nested_retry_keeps_initial_score() {
        let state = play_pass(playing(3), |_| false);
        let state = step(state, QuizAction::Retry);
        let state = play_pass(state, |i| i == 0);
        assert_eq!(session(&state).wrong_indices().len(), 2);

        let state = step(state, QuizAction::Retry);
        assert_eq!(session(&state).len(), 2);
        assert_eq!(session(&state).initial_score(), Some(0));
    }

    #[test]
    fn back_replays_recorded_answer_without_rescoring() {
        let state = step(playing(3), QuizAction::Select(1));
        let state = step(state, QuizAction::Advance);
        let state = step(state, QuizAction::Select(0));
        assert_eq!(session(&state).score(), 10);

        let state = step(state, QuizAction::Back);
        let s = session(&state);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.current_answer(), Some(1));
        assert!(s.revealed_explanation().is_some());

        let rejected = state.reduce(QuizAction::Select(0)).unwrap_err();
        assert_eq!(rejected.error, TransitionError::AlreadyAnswered { index: 0 });
        let state = rejected.state;

        let state = step(state, QuizAction::Advance);
        let s = session(&state);
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.current_answer(), Some(0));
        assert_eq!(s.wrong_indices().iter().copied().collect::<Vec<_>>(), vec![0]);

        let state = step(state, QuizAction::Back);
        let state = step(state, QuizAction::Advance);
        assert_eq!(session(&state).wrong_indices().len(), 1);
        assert_eq!(session(&state).score(), 10);
    }

    #[test]
    fn back_on_first_question_is_rejected() {
        let rejected = playing(2).reduce(QuizAction::Back).unwrap_err();
        assert_eq!(rejected.error, TransitionError::AtFirstQuestion);
    }

    #[test]
    fn actions_outside_their_phase_are_rejected() {
        let rejected = playing(2).reduce(QuizAction::Finish).unwrap_err();
        assert_eq!(
            rejected.error,
            TransitionError::InvalidPhase {
                action: ActionKind::Finish,
                phase: Phase::Playing
            }
        );

        let rejected = QuizState::Loading.reduce(QuizAction::Retry).unwrap_err();
        assert_eq!(rejected.state, QuizState::Loading);

        let finished = step(play_pass(playing(1), |_| true), QuizAction::Finish);
        let rejected = finished.reduce(QuizAction::Finish).unwrap_err();
        assert_eq!(rejected.state.phase(), Phase::Finished);
    }

    #[test]
    fn single_question_session() {
        let state = play_pass(playing(1), |_| false);
        assert_eq!(state.phase(), Phase::Result);
        assert_eq!(session(&state).final_score(), 0);
        assert_eq!(session(&state).wrong_indices().len(), 1);
    }
}
