//! Answer evaluation.

use crate::model::Question;

/// Fixed reward for a correct answer. There is no partial credit.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Outcome of scoring one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub correct: bool,
    pub points_awarded: u32,
}

/// Score `selected` against `question`.
///
/// `selected` is expected to be a valid option index; an out-of-range index
/// simply scores as incorrect.
#[must_use]
pub fn evaluate(question: &Question, selected: usize) -> Evaluation {
    let correct = selected == question.correct_answer_index();
    Evaluation {
        correct,
        points_awarded: if correct { POINTS_PER_CORRECT } else { 0 },
    }
}

/// Highest reachable score for a session of `question_count` questions.
#[must_use]
pub fn max_score(question_count: usize) -> u32 {
    u32::try_from(question_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(POINTS_PER_CORRECT)
}
