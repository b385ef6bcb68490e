//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{GameResultError, Grade, ProfileError, Subject, UserId};
use quiz_core::quiz::TransitionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for {subject} {grade}")]
    QuestionSourceUnavailable { subject: Subject, grade: Grade },

    #[error("daily limit of {limit} games reached for {subject}")]
    DailyLimitReached { subject: Subject, limit: u32 },

    #[error("no profile for user {0}")]
    UnknownProfile(UserId),

    #[error("session has not finished")]
    NotFinished,

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The score was computed but could not be saved; retrying is safe.
    #[error("failed to persist final score {final_score}: {source}")]
    PersistenceFailure {
        final_score: u32,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    GameResult(#[from] GameResultError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileServiceError {
    #[error("no profile for user {0}")]
    NotFound(UserId),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ResultsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultsServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid `SessionSettings`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("a session needs at least one question")]
    ZeroQuestions,
    #[error("daily limit must be at least one game")]
    ZeroDailyLimit,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
