use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::{ActivityRecord, Grade, UserId};

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("profile name cannot be empty")]
    EmptyName,

    #[error("profile name is too long: {len} characters")]
    NameTooLong { len: usize },

    #[error("last_active is before created_at")]
    InvalidTimeRange,
}

/// A learner's accumulated progress.
///
/// The streak is not stored here; it is derived from `completed_dates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    user_id: UserId,
    name: String,
    grade: Grade,
    total_points: u64,
    completed_dates: ActivityRecord,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

fn validate_name(name: String) -> Result<String, ProfileError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ProfileError::NameTooLong { len });
    }
    Ok(trimmed.to_owned())
}

impl Profile {
    /// Create a fresh profile with no points and no activity.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the name is blank or too long.
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            user_id,
            name: validate_name(name.into())?,
            grade,
            total_points: 0,
            completed_dates: ActivityRecord::new(),
            created_at: now,
            last_active: now,
        })
    }

    /// Rehydrate a profile from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the persisted values violate invariants.
    pub fn from_persisted(
        user_id: UserId,
        name: String,
        grade: Grade,
        total_points: u64,
        completed_dates: ActivityRecord,
        created_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        if last_active < created_at {
            return Err(ProfileError::InvalidTimeRange);
        }
        Ok(Self {
            user_id,
            name: validate_name(name)?,
            grade,
            total_points,
            completed_dates,
            created_at,
            last_active,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn grade(&self) -> Grade {
        self.grade
    }

    #[must_use]
    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    #[must_use]
    pub fn completed_dates(&self) -> &ActivityRecord {
        &self.completed_dates
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Change the display name.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the name is blank or too long.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProfileError> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    pub fn set_grade(&mut self, grade: Grade) {
        self.grade = grade;
    }

    /// Adds points and returns the new total.
    pub fn add_points(&mut self, delta: u32, at: DateTime<Utc>) -> u64 {
        self.total_points = self.total_points.saturating_add(u64::from(delta));
        self.touch(at);
        self.total_points
    }

    /// Records a completed day; returns `false` if it was already recorded.
    pub fn record_completed_date(&mut self, date: NaiveDate) -> bool {
        self.completed_dates.insert(date)
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_active {
            self.last_active = at;
        }
    }
}
