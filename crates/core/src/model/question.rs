use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every question offers exactly this many options.
pub const OPTION_COUNT: usize = 4;

//
// ─── SUBJECT & GRADE ───────────────────────────────────────────────────────────
//

/// Topic category with its own question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    English,
    Math,
    Science,
    Chinese,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::English,
        Subject::Math,
        Subject::Science,
        Subject::Chinese,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::English => "English",
            Subject::Math => "Math",
            Subject::Science => "Science",
            Subject::Chinese => "Chinese",
        }
    }
}

/// Learner cohort level; selects question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    Primary3,
    Primary4,
}

impl Grade {
    pub const ALL: [Grade; 2] = [Grade::Primary3, Grade::Primary4];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Primary3 => "Primary 3",
            Grade::Primary4 => "Primary 4",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogParseError {
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    #[error("unknown grade: {0}")]
    UnknownGrade(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = CatalogParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" => Ok(Subject::English),
            "math" | "maths" => Ok(Subject::Math),
            "science" => Ok(Subject::Science),
            "chinese" => Ok(Subject::Chinese),
            _ => Err(CatalogParseError::UnknownSubject(s.to_owned())),
        }
    }
}

impl FromStr for Grade {
    type Err = CatalogParseError;

    /// Accepts `Primary 3`, `primary-3`, `P3` and `3` style spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "primary3" | "p3" | "3" => Ok(Grade::Primary3),
            "primary4" | "p4" | "4" => Ok(Grade::Primary4),
            _ => Err(CatalogParseError::UnknownGrade(s.to_owned())),
        }
    }
}

//
// ─── QUESTION DRAFT ────────────────────────────────────────────────────────────
//

/// Unvalidated question as delivered by a content provider.
///
/// The serialized shape matches the question bank files
/// (`questionText`, `options`, `correctAnswerIndex`, `explanation`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: i64,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("expected 4 options, found {found}")]
    OptionCount { found: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("option {index} duplicates an earlier option")]
    DuplicateOption { index: usize },

    #[error("correct answer index {index} is out of range")]
    AnswerOutOfRange { index: i64 },
}

impl QuestionDraft {
    pub fn new(
        question_text: impl Into<String>,
        options: Vec<String>,
        correct_answer_index: i64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            question_text: question_text.into(),
            options,
            correct_answer_index,
            explanation: explanation.into(),
        }
    }

    /// Check the structural rules every playable question must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.question_text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let found = self.options.len();
        let options: [String; OPTION_COUNT] = self
            .options
            .try_into()
            .map_err(|_| QuestionError::OptionCount { found })?;

        let mut seen = HashSet::with_capacity(OPTION_COUNT);
        for (index, option) in options.iter().enumerate() {
            let key = option.trim();
            if key.is_empty() {
                return Err(QuestionError::EmptyOption { index });
            }
            if !seen.insert(key) {
                return Err(QuestionError::DuplicateOption { index });
            }
        }

        let correct_answer_index = usize::try_from(self.correct_answer_index)
            .ok()
            .filter(|i| *i < OPTION_COUNT)
            .ok_or(QuestionError::AnswerOutOfRange {
                index: self.correct_answer_index,
            })?;

        Ok(Question {
            question_text: self.question_text,
            options,
            correct_answer_index,
            explanation: self.explanation,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Immutable, validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    question_text: String,
    options: [String; OPTION_COUNT],
    correct_answer_index: usize,
    explanation: String,
}

impl Question {
    #[must_use]
    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer_index(&self) -> usize {
        self.correct_answer_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_answer_index]
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

impl From<Question> for QuestionDraft {
    fn from(question: Question) -> Self {
        Self {
            question_text: question.question_text,
            options: question.options.into(),
            correct_answer_index: i64::try_from(question.correct_answer_index)
                .unwrap_or(i64::MAX),
            explanation: question.explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(options: &[&str], correct: i64) -> QuestionDraft {
        QuestionDraft::new(
            "Which planet is known as the Red Planet?",
            options.iter().map(ToString::to_string).collect(),
            correct,
            "Iron oxide makes Mars look red.",
        )
    }

    #[test]
    fn valid_draft_becomes_question() {
        let q = draft(&["Earth", "Mars", "Jupiter", "Venus"], 1)
            .validate()
            .unwrap();
        assert_eq!(q.correct_answer_index(), 1);
        assert_eq!(q.correct_option(), "Mars");
        assert_eq!(q.options().len(), OPTION_COUNT);
    }

    #[test]
    fn rejects_wrong_option_count() {
        let err = draft(&["Earth", "Mars", "Venus"], 1).validate().unwrap_err();
        assert_eq!(err, QuestionError::OptionCount { found: 3 });
    }

    #[test]
    fn rejects_out_of_range_answer() {
        let options = ["Earth", "Mars", "Jupiter", "Venus"];
        assert_eq!(
            draft(&options, 4).validate().unwrap_err(),
            QuestionError::AnswerOutOfRange { index: 4 }
        );
        assert_eq!(
            draft(&options, -1).validate().unwrap_err(),
            QuestionError::AnswerOutOfRange { index: -1 }
        );
    }

    #[test]
    fn rejects_duplicate_and_blank_options() {
        assert_eq!(
            draft(&["Earth", "Mars", "Mars ", "Venus"], 1)
                .validate()
                .unwrap_err(),
            QuestionError::DuplicateOption { index: 2 }
        );
        assert_eq!(
            draft(&["Earth", " ", "Jupiter", "Venus"], 0)
                .validate()
                .unwrap_err(),
            QuestionError::EmptyOption { index: 1 }
        );
    }

    #[test]
    fn draft_deserializes_bank_shape() {
        let json = r#"{
            "questionText": "2 + 2 = ?",
            "options": ["3", "4", "5", "6"],
            "correctAnswerIndex": 1,
            "explanation": "Two plus two is four."
        }"#;
        let draft: QuestionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.correct_answer_index, 1);
        assert_eq!(draft.validate().unwrap().correct_option(), "4");
    }

    #[test]
    fn missing_explanation_defaults_to_empty() {
        let json = r#"{"questionText":"Q?","options":["a","b","c","d"],"correctAnswerIndex":0}"#;
        let draft: QuestionDraft = serde_json::from_str(json).unwrap();
        assert!(draft.explanation.is_empty());
    }

    #[test]
    fn grade_and_subject_parse_leniently() {
        assert_eq!("Primary 3".parse::<Grade>().unwrap(), Grade::Primary3);
        assert_eq!("p4".parse::<Grade>().unwrap(), Grade::Primary4);
        assert_eq!("primary-4".parse::<Grade>().unwrap(), Grade::Primary4);
        assert!("Primary 5".parse::<Grade>().is_err());

        assert_eq!("maths".parse::<Subject>().unwrap(), Subject::Math);
        assert_eq!(" Science ".parse::<Subject>().unwrap(), Subject::Science);
        assert!("History".parse::<Subject>().is_err());
    }

    #[test]
    fn question_converts_back_to_draft() {
        let q = draft(&["Earth", "Mars", "Jupiter", "Venus"], 1)
            .validate()
            .unwrap();
        let back = QuestionDraft::from(q.clone());
        assert_eq!(back.validate().unwrap(), q);
    }
}
