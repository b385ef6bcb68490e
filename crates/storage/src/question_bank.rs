//! File-backed question source.
//!
//! A bank is a directory holding one JSON array of question drafts per
//! subject and grade, named `<Subject>_<Grade>.json` (for example
//! `Math_Primary 3.json`).

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quiz_core::model::{Grade, Question, QuestionDraft, QuestionError, Subject};
use thiserror::Error;
use tracing::{debug, warn};

use crate::repository::{QuestionSource, StorageError};

/// Question texts shorter than this are flagged by [`JsonQuestionBank::validate_bank`].
pub const MIN_QUESTION_TEXT_LEN: usize = 10;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<QuestionBankError> for StorageError {
    fn from(err: QuestionBankError) -> Self {
        match &err {
            QuestionBankError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StorageError::NotFound
            }
            QuestionBankError::Io { .. } => StorageError::Connection(err.to_string()),
            QuestionBankError::Json { .. } => StorageError::Serialization(err.to_string()),
        }
    }
}

/// A problem found in a bank file or one of its questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankIssue {
    /// The file could not be read or is not a JSON array.
    Unreadable {
        error: String,
    },
    /// The entry does not have the shape of a question draft.
    Malformed {
        position: usize,
        error: String,
    },
    Invalid {
        position: usize,
        error: QuestionError,
    },
    ShortText {
        position: usize,
        len: usize,
    },
    /// The correct option carries a number the explanation never mentions.
    AnswerNotExplained {
        position: usize,
        answer: String,
    },
}

impl std::fmt::Display for BankIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankIssue::Unreadable { error } => write!(f, "unreadable: {error}"),
            BankIssue::Malformed { position, error } => {
                write!(f, "Q{}: malformed entry: {error}", position + 1)
            }
            BankIssue::Invalid { position, error } => write!(f, "Q{}: {error}", position + 1),
            BankIssue::ShortText { position, len } => {
                write!(f, "Q{}: question text too short ({len} characters)", position + 1)
            }
            BankIssue::AnswerNotExplained { position, answer } => {
                write!(f, "Q{}: answer \"{answer}\" not found in explanation", position + 1)
            }
        }
    }
}

/// Validation outcome for one bank file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankFileReport {
    pub file_name: String,
    /// `None` when the file name does not follow `<Subject>_<Grade>.json`.
    pub catalog: Option<(Subject, Grade)>,
    pub total: usize,
    pub issues: Vec<BankIssue>,
}

impl BankFileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.catalog.is_some() && self.issues.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct JsonQuestionBank {
    root: PathBuf,
}

#[must_use]
pub fn bank_file_name(subject: Subject, grade: Grade) -> String {
    format!("{}_{}.json", subject.as_str(), grade.as_str())
}

/// Parses `<Subject>_<Grade>.json` back into its catalog entry.
#[must_use]
pub fn parse_bank_file_name(file_name: &str) -> Option<(Subject, Grade)> {
    let stem = file_name.strip_suffix(".json")?;
    let (subject, grade) = stem.split_once('_')?;
    Some((subject.parse().ok()?, grade.parse().ok()?))
}

impl JsonQuestionBank {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, subject: Subject, grade: Grade) -> PathBuf {
        self.root.join(bank_file_name(subject, grade))
    }

    /// Reads a bank file as a JSON array, decoding each entry on its own so
    /// one badly shaped entry does not hide the rest.
    async fn read_entries(
        path: &Path,
    ) -> Result<Vec<Result<QuestionDraft, serde_json::Error>>, QuestionBankError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| QuestionBankError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let values: Vec<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|source| QuestionBankError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(values.into_iter().map(serde_json::from_value).collect())
    }

    /// Check every bank file under the root, in file name order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the directory cannot be listed. Files
    /// that cannot be read or parsed are reported as [`BankIssue::Unreadable`].
    pub async fn validate_bank(&self) -> Result<Vec<BankFileReport>, QuestionBankError> {
        let io_err = |source: io::Error| QuestionBankError::Io {
            path: self.root.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                files.push((name, entry.path()));
            }
        }
        files.sort();

        let mut reports = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            let catalog = parse_bank_file_name(&file_name);
            let entries = match Self::read_entries(&path).await {
                Ok(entries) => entries,
                Err(err) => {
                    reports.push(BankFileReport {
                        file_name,
                        catalog,
                        total: 0,
                        issues: vec![BankIssue::Unreadable {
                            error: err.to_string(),
                        }],
                    });
                    continue;
                }
            };
            let issues = entries
                .iter()
                .enumerate()
                .flat_map(|(position, entry)| match entry {
                    Ok(draft) => check_draft(position, draft),
                    Err(err) => vec![BankIssue::Malformed {
                        position,
                        error: err.to_string(),
                    }],
                })
                .collect();
            reports.push(BankFileReport {
                file_name,
                catalog,
                total: entries.len(),
                issues,
            });
        }
        Ok(reports)
    }
}

fn check_draft(position: usize, draft: &QuestionDraft) -> Vec<BankIssue> {
    let mut issues = Vec::new();
    let len = draft.question_text.trim().chars().count();
    match draft.clone().validate() {
        Err(error) => issues.push(BankIssue::Invalid { position, error }),
        Ok(question) => {
            if len < MIN_QUESTION_TEXT_LEN {
                issues.push(BankIssue::ShortText { position, len });
            }
            if !explanation_mentions_answer(question.correct_option(), question.explanation()) {
                issues.push(BankIssue::AnswerNotExplained {
                    position,
                    answer: question.correct_option().to_owned(),
                });
            }
        }
    }
    issues
}

fn digit_runs(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
}

/// A numeric answer must show up in an explanation that quotes numbers.
/// Answers without digits and explanations without numbers always pass.
fn explanation_mentions_answer(answer: &str, explanation: &str) -> bool {
    let Some(first_number) = digit_runs(answer).next() else {
        return true;
    };
    let digits: String = answer.chars().filter(char::is_ascii_digit).collect();
    if explanation.contains(&digits) {
        return true;
    }
    let mut numbers = digit_runs(explanation).peekable();
    numbers.peek().is_none() || numbers.any(|n| n == first_number)
}

#[async_trait]
impl QuestionSource for JsonQuestionBank {
    async fn fetch(&self, subject: Subject, grade: Grade) -> Result<Vec<Question>, StorageError> {
        let path = self.path_for(subject, grade);
        let entries = Self::read_entries(&path).await?;
        let total = entries.len();

        let mut questions = Vec::with_capacity(total);
        for (position, entry) in entries.into_iter().enumerate() {
            let draft = match entry {
                Ok(draft) => draft,
                Err(error) => {
                    warn!(%subject, %grade, position, %error, "skipping malformed question");
                    continue;
                }
            };
            match draft.validate() {
                Ok(question) => questions.push(question),
                Err(error) => {
                    warn!(%subject, %grade, position, %error, "skipping invalid question");
                }
            }
        }
        debug!(%subject, %grade, total, valid = questions.len(), "loaded question bank");
        Ok(questions)
    }
}
