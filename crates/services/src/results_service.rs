use std::sync::Arc;

use quiz_core::model::{Grade, Subject, UserId};
use quiz_core::time::day_bounds;
use storage::repository::{GameResultRow, ProfileStore, ResultReporter};

use crate::Clock;
use crate::error::ResultsServiceError;

/// Entries shown on the leaderboard by default.
pub const DEFAULT_LEADERBOARD_SIZE: u32 = 10;
/// Results shown in a learner's history by default.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: UserId,
    pub name: String,
    pub grade: Grade,
    pub total_points: u64,
}

/// Read side over stored results and profile totals.
#[derive(Clone)]
pub struct ResultsService {
    clock: Clock,
    profiles: Arc<dyn ProfileStore>,
    results: Arc<dyn ResultReporter>,
}

impl ResultsService {
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

    /// Top profiles by total points.
    ///
    /// # Errors
    ///
    /// Returns `ResultsServiceError::Storage` if repository access fails.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ResultsServiceError> {
        let profiles = self.profiles.top_profiles(limit).await?;
        Ok(profiles
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                user_id: p.user_id().clone(),
                name: p.name().to_owned(),
                grade: p.grade(),
                total_points: p.total_points(),
            })
            .collect())
    }

    /// Latest results for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ResultsServiceError::Storage` if repository access fails.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<GameResultRow>, ResultsServiceError> {
        Ok(self.results.recent_results(user_id, limit).await?)
    }

    /// Games finished today (UTC) for one subject.
    ///
    /// # Errors
    ///
    /// Returns `ResultsServiceError::Storage` if repository access fails.
    pub async fn games_played_today(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<u32, ResultsServiceError> {
        let (from, until) = day_bounds(self.clock.today());
        Ok(self
            .results
            .count_results(user_id, Some(subject), Some(from), Some(until))
            .await?)
    }
}
