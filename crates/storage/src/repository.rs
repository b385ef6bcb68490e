use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quiz_core::model::{GameResult, GameResultId, Grade, Profile, Question, Subject, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted game result together with its assigned ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResultRow {
    pub id: GameResultId,
    pub result: GameResult,
}

impl GameResultRow {
    #[must_use]
    pub fn new(id: GameResultId, result: GameResult) -> Self {
        Self { id, result }
    }
}

/// Supplier of questions for a subject and grade.
///
/// An empty list is a valid answer; callers decide what "nothing to play" means.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch every available question for `subject` at `grade`, in source order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the source cannot be read.
    async fn fetch(&self, subject: Subject, grade: Grade) -> Result<Vec<Question>, StorageError>;
}

/// Repository contract for learner profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile, or `None` if the user has never been onboarded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError>;

    /// Insert or update a profile.
    ///
    /// Completed dates are merged in, never removed. On update the stored
    /// total points are kept; they only move through `accumulate_points`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Record `date` as a completed day. Returns `false` if it was already present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile does not exist.
    async fn append_completed_date(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<bool, StorageError>;

    /// Add `delta` to the user's total points and return the new total.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile does not exist.
    async fn accumulate_points(
        &self,
        user_id: &UserId,
        delta: u32,
        at: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// Highest-scoring profiles, best first. Ties go to the earlier profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn top_profiles(&self, limit: u32) -> Result<Vec<Profile>, StorageError>;
}

/// Repository contract for completed game results.
#[async_trait]
pub trait ResultReporter: Send + Sync {
    /// Persist a final result. No internal retry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn persist(&self, result: &GameResult) -> Result<GameResultId, StorageError>;

    /// Count results for a user, optionally narrowed to one subject and to
    /// `from <= recorded_at < until`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_results(
        &self,
        user_id: &UserId,
        subject: Option<Subject>,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<u32, StorageError>;

    /// Latest results for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn recent_results(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<GameResultRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and guest play.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<(Subject, Grade), Vec<Question>>>>,
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    results: Arc<Mutex<Vec<GameResultRow>>>,
}

fn poisoned<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn limit_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the questions served for `subject` at `grade`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn seed_questions(
        &self,
        subject: Subject,
        grade: Grade,
        questions: Vec<Question>,
    ) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert((subject, grade), questions);
        Ok(())
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch(&self, subject: Subject, grade: Grade) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.get(&(subject, grade)).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProfileStore for InMemoryRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let merged = match guard.get(profile.user_id()) {
            None => profile.clone(),
            Some(existing) => {
                let mut dates = profile.completed_dates().clone();
                for date in existing.completed_dates() {
                    dates.insert(*date);
                }
                Profile::from_persisted(
                    profile.user_id().clone(),
                    profile.name().to_owned(),
                    profile.grade(),
                    existing.total_points(),
                    dates,
                    existing.created_at(),
                    existing.last_active().max(profile.last_active()),
                )
                .map_err(|e| StorageError::Serialization(e.to_string()))?
            }
        };
        guard.insert(profile.user_id().clone(), merged);
        Ok(())
    }

    async fn append_completed_date(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<bool, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let profile = guard.get_mut(user_id).ok_or(StorageError::NotFound)?;
        Ok(profile.record_completed_date(date))
    }

    async fn accumulate_points(
        &self,
        user_id: &UserId,
        delta: u32,
        at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let profile = guard.get_mut(user_id).ok_or(StorageError::NotFound)?;
        Ok(profile.add_points(delta, at))
    }

    async fn top_profiles(&self, limit: u32) -> Result<Vec<Profile>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        let mut profiles: Vec<Profile> = guard.values().cloned().collect();
        profiles.sort_by(|a, b| {
            b.total_points()
                .cmp(&a.total_points())
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.user_id().cmp(b.user_id()))
        });
        profiles.truncate(limit_usize(limit));
        Ok(profiles)
    }
}

#[async_trait]
impl ResultReporter for InMemoryRepository {
    async fn persist(&self, result: &GameResult) -> Result<GameResultId, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        let next = u64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("result id overflow".into()))?
            + 1;
        let id = GameResultId::new(next);
        guard.push(GameResultRow::new(id, result.clone()));
        Ok(id)
    }

    async fn count_results(
        &self,
        user_id: &UserId,
        subject: Option<Subject>,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<u32, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let count = guard
            .iter()
            .map(|row| &row.result)
            .filter(|r| r.user_id() == user_id)
            .filter(|r| subject.is_none_or(|s| r.subject() == s))
            .filter(|r| from.is_none_or(|f| r.recorded_at() >= f))
            .filter(|r| until.is_none_or(|u| r.recorded_at() < u))
            .count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("count overflow".into()))
    }

    async fn recent_results(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<GameResultRow>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows: Vec<GameResultRow> = guard
            .iter()
            .filter(|row| row.result.user_id() == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .recorded_at()
                .cmp(&a.result.recorded_at())
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(limit_usize(limit));
        Ok(rows)
    }
}

/// Aggregates profile and result repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileStore>,
    pub results: Arc<dyn ResultReporter>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn ProfileStore> = Arc::new(repo.clone());
        let results: Arc<dyn ResultReporter> = Arc::new(repo);
        Self { profiles, results }
    }
}
