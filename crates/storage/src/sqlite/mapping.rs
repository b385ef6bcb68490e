use chrono::{DateTime, Utc};
use quiz_core::model::{
    ActivityRecord, GameResult, GameResultId, Grade, Profile, Subject, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{GameResultRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_str(raw: &str) -> Result<UserId, StorageError> {
    UserId::new(raw).map_err(ser)
}

pub(crate) fn parse_subject(raw: &str) -> Result<Subject, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn parse_grade(raw: &str) -> Result<Grade, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn result_id_from_i64(v: i64) -> Result<GameResultId, StorageError> {
    Ok(GameResultId::new(i64_to_u64("result_id", v)?))
}

/// Maps a `profiles` row; completed dates are loaded separately.
pub(crate) fn map_profile_row(
    row: &SqliteRow,
    completed_dates: ActivityRecord,
) -> Result<Profile, StorageError> {
    let user_id = user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let grade = parse_grade(&row.try_get::<String, _>("grade").map_err(ser)?)?;
    let total_points = i64_to_u64(
        "total_points",
        row.try_get::<i64, _>("total_points").map_err(ser)?,
    )?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    let last_active: DateTime<Utc> = row.try_get("last_active").map_err(ser)?;

    Profile::from_persisted(
        user_id,
        row.try_get("name").map_err(ser)?,
        grade,
        total_points,
        completed_dates,
        created_at,
        last_active,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<GameResultRow, StorageError> {
    let id = result_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let result = GameResult::new(
        user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        parse_subject(&row.try_get::<String, _>("subject").map_err(ser)?)?,
        parse_grade(&row.try_get::<String, _>("grade").map_err(ser)?)?,
        u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        row.try_get("recorded_at").map_err(ser)?,
    )
    .map_err(ser)?;
    Ok(GameResultRow::new(id, result))
}
