use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Questions per session when nothing else is configured.
pub const DEFAULT_QUESTIONS_PER_SESSION: u32 = 10;

/// How sessions are planned and gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    questions_per_session: u32,
    shuffle: bool,
    daily_limit_per_subject: Option<u32>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            questions_per_session: DEFAULT_QUESTIONS_PER_SESSION,
            shuffle: true,
            daily_limit_per_subject: None,
        }
    }
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns `SettingsError` if the question count or the daily limit is zero.
    pub fn new(
        questions_per_session: u32,
        shuffle: bool,
        daily_limit_per_subject: Option<u32>,
    ) -> Result<Self, SettingsError> {
        if questions_per_session == 0 {
            return Err(SettingsError::ZeroQuestions);
        }
        if daily_limit_per_subject == Some(0) {
            return Err(SettingsError::ZeroDailyLimit);
        }
        Ok(Self {
            questions_per_session,
            shuffle,
            daily_limit_per_subject,
        })
    }

    #[must_use]
    pub fn questions_per_session(&self) -> u32 {
        self.questions_per_session
    }

    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    #[must_use]
    pub fn daily_limit_per_subject(&self) -> Option<u32> {
        self.daily_limit_per_subject
    }
}
