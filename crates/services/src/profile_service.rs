use std::sync::Arc;

use tracing::info;

use quiz_core::model::{Grade, Profile, UserId};
use quiz_core::streak::current_streak;
use storage::repository::{ProfileStore, ResultReporter};

use crate::Clock;
use crate::error::ProfileServiceError;

/// Profile plus the figures derived from it at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileOverview {
    pub profile: Profile,
    pub games_played: u32,
    pub streak: u32,
    pub played_today: bool,
}

/// Onboarding and profile queries.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileStore>,
    results: Arc<dyn ResultReporter>,
}

impl ProfileService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileStore>,
        results: Arc<dyn ResultReporter>,
    ) -> Self {
        Self {
            clock,
            profiles,
            results,
        }
    }

    /// Return the existing profile, or onboard a new one with `name` and `grade`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` if a new profile fails validation.
    /// Returns `ProfileServiceError::Storage` if repository access fails.
    pub async fn load_or_create(
        &self,
        user_id: &UserId,
        name: &str,
        grade: Grade,
    ) -> Result<Profile, ProfileServiceError> {
        if let Some(profile) = self.profiles.get_profile(user_id).await? {
            return Ok(profile);
        }

        let profile = Profile::new(user_id.clone(), name, grade, self.clock.now())?;
        self.profiles.upsert_profile(&profile).await?;
        info!(user = %user_id, %grade, "profile created");
        Ok(profile)
    }

    /// Fetch a profile by user.
    ///
    /// Returns `Ok(None)` when the user has not been onboarded.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` if repository access fails.
    pub async fn get(&self, user_id: &UserId) -> Result<Option<Profile>, ProfileServiceError> {
        Ok(self.profiles.get_profile(user_id).await?)
    }

    /// Load the profile with its games played and current streak.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::NotFound` if the user has no profile.
    /// Returns `ProfileServiceError::Storage` if repository access fails.
    pub async fn overview(&self, user_id: &UserId) -> Result<ProfileOverview, ProfileServiceError> {
        let profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ProfileServiceError::NotFound(user_id.clone()))?;
        let games_played = self.results.count_results(user_id, None, None, None).await?;
        let today = self.clock.today();

        Ok(ProfileOverview {
            streak: current_streak(profile.completed_dates(), today),
            played_today: profile.completed_dates().contains(today),
            games_played,
            profile,
        })
    }

    /// Change the display name and/or grade.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::NotFound` if the user has no profile.
    /// Returns `ProfileServiceError::Profile` if the new name is invalid.
    /// Returns `ProfileServiceError::Storage` if repository access fails.
    pub async fn update_details(
        &self,
        user_id: &UserId,
        name: Option<&str>,
        grade: Option<Grade>,
    ) -> Result<Profile, ProfileServiceError> {
        let mut profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ProfileServiceError::NotFound(user_id.clone()))?;

        if let Some(name) = name {
            profile.rename(name)?;
        }
        if let Some(grade) = grade {
            profile.set_grade(grade);
        }
        profile.touch(self.clock.now());
        self.profiles.upsert_profile(&profile).await?;
        Ok(profile)
    }
}
