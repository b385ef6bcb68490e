mod activity;
mod ids;
mod profile;
mod question;
mod result;

pub use activity::{ActivityError, ActivityRecord, format_activity_date, parse_activity_date};
pub use ids::{GameResultId, UserId, UserIdError};
pub use profile::{Profile, ProfileError};
pub use question::{CatalogParseError, Grade, OPTION_COUNT, Question, QuestionDraft, QuestionError, Subject};
pub use result::{GameResult, GameResultError};
