#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod profile_service;
pub mod results_service;
pub mod sessions;
pub mod settings;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{
    AppServicesError, ProfileServiceError, ResultsServiceError, SessionError, SettingsError,
};
pub use profile_service::{ProfileOverview, ProfileService};
pub use results_service::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_LEADERBOARD_SIZE, LeaderboardEntry, ResultsService,
};
pub use sessions::{
    AnswerFeedback, QuizLoopService, SessionBuilder, SessionController, SessionOutcome,
    SessionPlan, SessionProgress,
};
pub use settings::SessionSettings;
