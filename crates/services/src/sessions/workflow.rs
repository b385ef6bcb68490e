use std::sync::Arc;

use tracing::{info, warn};

use quiz_core::model::{GameResult, GameResultId, Grade, Subject, UserId};
use quiz_core::quiz::Phase;
use quiz_core::streak::current_streak;
use quiz_core::time::day_bounds;
use storage::repository::{ProfileStore, QuestionSource, ResultReporter, StorageError};

use super::plan::SessionBuilder;
use super::service::SessionController;
use crate::Clock;
use crate::error::SessionError;
use crate::settings::SessionSettings;

/// Everything persisted for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub result_id: GameResultId,
    pub final_score: u32,
    pub total_questions: u32,
    /// Profile total after this session was credited.
    pub total_points: u64,
    /// Consecutive-day streak including the completion day.
    pub streak: u32,
}

/// Orchestrates session start and persisted finishing.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    settings: SessionSettings,
    questions: Arc<dyn QuestionSource>,
    profiles: Arc<dyn ProfileStore>,
    results: Arc<dyn ResultReporter>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        profiles: Arc<dyn ProfileStore>,
        results: Arc<dyn ResultReporter>,
    ) -> Self {
        Self {
            clock,
            settings: SessionSettings::default(),
            questions,
            profiles,
            results,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start a session for `user_id`.
    ///
    /// A failed or empty question fetch is not an error: the returned
    /// controller is in the `Unavailable` phase.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownProfile` if the user has no profile,
    /// `SessionError::DailyLimitReached` if the subject's daily limit is used
    /// up, or `SessionError::Storage` if those checks cannot be made.
    pub async fn start_session(
        &self,
        user_id: &UserId,
        subject: Subject,
        grade: Grade,
    ) -> Result<SessionController, SessionError> {
        if self.profiles.get_profile(user_id).await?.is_none() {
            return Err(SessionError::UnknownProfile(user_id.clone()));
        }

        if let Some(limit) = self.settings.daily_limit_per_subject() {
            let (from, until) = day_bounds(self.clock.today());
            let played = self
                .results
                .count_results(user_id, Some(subject), Some(from), Some(until))
                .await?;
            if played >= limit {
                info!(user = %user_id, %subject, played, limit, "daily limit reached");
                return Err(SessionError::DailyLimitReached { subject, limit });
            }
        }

        let mut controller = SessionController::new(subject, grade, self.clock.now());
        match self.questions.fetch(subject, grade).await {
            Ok(questions) => {
                let plan = SessionBuilder::new(self.settings.questions_per_session())
                    .with_shuffle(self.settings.shuffle())
                    .build(questions);
                let total = plan.total();
                if controller.start(plan.questions)? == Phase::Unavailable {
                    warn!(%subject, %grade, "question source returned no questions");
                } else {
                    info!(user = %user_id, %subject, %grade, total, "session started");
                }
            }
            Err(error) => {
                warn!(%subject, %grade, %error, "question source failed");
                controller.source_failed()?;
            }
        }
        Ok(controller)
    }

    /// Finish the session (if still in `Result`) and persist its outcome.
    ///
    /// Persistence runs in three steps: store the result, credit points, then
    /// record the completion day. Steps that already succeeded are skipped, so
    /// calling this again after a `PersistenceFailure` never double-credits.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session is not in
    /// `Result` or `Finished`, and `SessionError::PersistenceFailure` if a
    /// storage step fails.
    pub async fn finish_session(
        &self,
        user_id: &UserId,
        controller: &mut SessionController,
    ) -> Result<SessionOutcome, SessionError> {
        if controller.phase() != Phase::Finished {
            controller.finish(self.clock.now())?;
        }
        let finished = controller.finished().ok_or(SessionError::NotFinished)?;
        let completed_at = controller.completed_at().ok_or(SessionError::NotFinished)?;
        let final_score = finished.final_score;
        let total_questions = u32::try_from(finished.total_questions)
            .map_err(|_| StorageError::Serialization("too many questions".into()))?;
        let failed = |source: StorageError| {
            warn!(user = %user_id, final_score, error = %source, "failed to persist session");
            SessionError::PersistenceFailure {
                final_score,
                source,
            }
        };

        let progress = controller.persisted();
        let result_id = match progress.result_id {
            Some(id) => id,
            None => {
                let result = GameResult::new(
                    user_id.clone(),
                    controller.subject(),
                    controller.grade(),
                    final_score,
                    total_questions,
                    completed_at,
                )?;
                let id = self.results.persist(&result).await.map_err(failed)?;
                controller.set_result_id(id);
                id
            }
        };

        let total_points = match progress.total_points {
            Some(total) => total,
            None => {
                let total = self
                    .profiles
                    .accumulate_points(user_id, final_score, completed_at)
                    .await
                    .map_err(failed)?;
                controller.set_total_points(total);
                total
            }
        };

        let completed_on = completed_at.date_naive();
        if !progress.date_recorded {
            self.profiles
                .append_completed_date(user_id, completed_on)
                .await
                .map_err(failed)?;
            controller.set_date_recorded();
        }

        let profile = self
            .profiles
            .get_profile(user_id)
            .await
            .map_err(failed)?
            .ok_or_else(|| SessionError::UnknownProfile(user_id.clone()))?;
        let streak = current_streak(profile.completed_dates(), completed_on);

        info!(
            user = %user_id,
            subject = %controller.subject(),
            final_score,
            total_points,
            streak,
            result_id = %result_id,
            "session persisted"
        );

        Ok(SessionOutcome {
            result_id,
            final_score,
            total_questions,
            total_points,
            streak,
        })
    }
}
