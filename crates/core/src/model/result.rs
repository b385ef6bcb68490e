use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Grade, Subject, UserId};
use crate::scoring::{POINTS_PER_CORRECT, max_score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameResultError {
    #[error("a game needs at least one question")]
    NoQuestions,

    #[error("score {score} exceeds the maximum of {max}")]
    ScoreTooHigh { score: u32, max: u32 },

    #[error("score {score} is not a multiple of 10")]
    UnevenScore { score: u32 },
}

/// Final score of one completed session, as reported to the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    user_id: UserId,
    subject: Subject,
    grade: Grade,
    score: u32,
    total_questions: u32,
    recorded_at: DateTime<Utc>,
}

impl GameResult {
    /// Build a result, checking the score is reachable for the question count.
    ///
    /// # Errors
    ///
    /// Returns `GameResultError` if the score cannot come from `total_questions` answers.
    pub fn new(
        user_id: UserId,
        subject: Subject,
        grade: Grade,
        score: u32,
        total_questions: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, GameResultError> {
        if total_questions == 0 {
            return Err(GameResultError::NoQuestions);
        }
        let max = max_score(total_questions as usize);
        if score > max {
            return Err(GameResultError::ScoreTooHigh { score, max });
        }
        if score % POINTS_PER_CORRECT != 0 {
            return Err(GameResultError::UnevenScore { score });
        }
        Ok(Self {
            user_id,
            subject,
            grade,
            score,
            total_questions,
            recorded_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
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
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Number of questions answered correctly.
    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.score / POINTS_PER_CORRECT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build(score: u32, total: u32) -> Result<GameResult, GameResultError> {
        GameResult::new(
            UserId::guest(),
            Subject::Math,
            Grade::Primary3,
            score,
            total,
            fixed_now(),
        )
    }

    #[test]
    fn counts_correct_answers() {
        let result = build(70, 10).unwrap();
        assert_eq!(result.correct_answers(), 7);
    }

    #[test]
    fn rejects_unreachable_scores() {
        assert_eq!(
            build(110, 10).unwrap_err(),
            GameResultError::ScoreTooHigh { score: 110, max: 100 }
        );
        assert_eq!(build(15, 10).unwrap_err(), GameResultError::UnevenScore { score: 15 });
        assert_eq!(build(0, 0).unwrap_err(), GameResultError::NoQuestions);
    }
}
