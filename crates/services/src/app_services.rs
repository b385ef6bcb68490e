use std::sync::Arc;

use storage::repository::{QuestionSource, Storage};

use crate::Clock;
use crate::error::AppServicesError;
use crate::profile_service::ProfileService;
use crate::results_service::ResultsService;
use crate::sessions::QuizLoopService;
use crate::settings::SessionSettings;

/// Assembles app-facing services over one storage backend.
///
/// The backend is chosen once here; every service shares it.
#[derive(Clone)]
pub struct AppServices {
    profiles: Arc<ProfileService>,
    results: Arc<ResultsService>,
    quiz_loop: Arc<QuizLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: SessionSettings,
        questions: Arc<dyn QuestionSource>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings, questions))
    }

    /// Build services over a fresh in-memory store. Nothing outlives the process.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        settings: SessionSettings,
        questions: Arc<dyn QuestionSource>,
    ) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, settings, questions)
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        settings: SessionSettings,
        questions: Arc<dyn QuestionSource>,
    ) -> Self {
        let profiles = Arc::new(ProfileService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.results),
        ));
        let results = Arc::new(ResultsService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.results),
        ));
        let quiz_loop = Arc::new(
            QuizLoopService::new(
                clock,
                questions,
                Arc::clone(&storage.profiles),
                Arc::clone(&storage.results),
            )
            .with_settings(settings),
        );

        Self {
            profiles,
            results,
            quiz_loop,
        }
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultsService> {
        Arc::clone(&self.results)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }
}
