use chrono::{DateTime, Utc};
use quiz_core::model::{GameResult, GameResultId, Subject, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_result_row, result_id_from_i64, ser};
use crate::repository::{GameResultRow, ResultReporter, StorageError};

#[async_trait::async_trait]
impl ResultReporter for SqliteRepository {
    async fn persist(&self, result: &GameResult) -> Result<GameResultId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO game_results (
                    user_id, subject, grade, score, total_questions, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(result.user_id().as_str())
        .bind(result.subject().as_str())
        .bind(result.grade().as_str())
        .bind(i64::from(result.score()))
        .bind(i64::from(result.total_questions()))
        .bind(result.recorded_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        result_id_from_i64(res.last_insert_rowid())
    }

    async fn count_results(
        &self,
        user_id: &UserId,
        subject: Option<Subject>,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<u32, StorageError> {
        let mut sql = String::from(
            r"
                SELECT COUNT(*) AS total
                FROM game_results
                WHERE user_id = ?1
            ",
        );

        let mut bind_index = 2;
        if subject.is_some() {
            sql.push_str(" AND subject = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if from.is_some() {
            sql.push_str(" AND recorded_at >= ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if until.is_some() {
            sql.push_str(" AND recorded_at < ?");
            sql.push_str(&bind_index.to_string());
        }

        let mut query = sqlx::query(&sql).bind(user_id.as_str());
        if let Some(subject) = subject {
            query = query.bind(subject.as_str());
        }
        if let Some(from) = from {
            query = query.bind(from);
        }
        if let Some(until) = until {
            query = query.bind(until);
        }

        let row = query.fetch_one(&self.pool).await.map_err(conn)?;
        let total: i64 = row.try_get("total").map_err(ser)?;
        u32::try_from(total)
            .map_err(|_| StorageError::Serialization(format!("invalid count: {total}")))
    }

    async fn recent_results(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<GameResultRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, subject, grade, score, total_questions, recorded_at
                FROM game_results
                WHERE user_id = ?1
                ORDER BY recorded_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }
}
