use chrono::{DateTime, NaiveDate, Utc};
use quiz_core::model::{ActivityRecord, Profile, UserId, format_activity_date, parse_activity_date};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row, ser, u64_to_i64, user_id_from_str};
use crate::repository::{ProfileStore, StorageError};

impl SqliteRepository {
    async fn load_completed_dates(&self, user_id: &UserId) -> Result<ActivityRecord, StorageError> {
        let rows = sqlx::query("SELECT date FROM completed_dates WHERE user_id = ?1")
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut record = ActivityRecord::new();
        for row in rows {
            let raw: String = row.try_get("date").map_err(ser)?;
            record.insert(parse_activity_date(&raw).map_err(ser)?);
        }
        Ok(record)
    }

    async fn profile_exists(&self, user_id: &UserId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM profiles WHERE user_id = ?1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl ProfileStore for SqliteRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, name, grade, total_points, created_at, last_active
                FROM profiles
                WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let dates = self.load_completed_dates(user_id).await?;
        map_profile_row(&row, dates).map(Some)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO profiles (user_id, name, grade, total_points, created_at, last_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                grade = excluded.grade,
                last_active = MAX(profiles.last_active, excluded.last_active)
            ",
        )
        .bind(profile.user_id().as_str())
        .bind(profile.name())
        .bind(profile.grade().as_str())
        .bind(u64_to_i64("total_points", profile.total_points())?)
        .bind(profile.created_at())
        .bind(profile.last_active())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for date in profile.completed_dates() {
            sqlx::query(
                r"
                INSERT INTO completed_dates (user_id, date)
                VALUES (?1, ?2)
                ON CONFLICT(user_id, date) DO NOTHING
                ",
            )
            .bind(profile.user_id().as_str())
            .bind(format_activity_date(*date))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn append_completed_date(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<bool, StorageError> {
        if !self.profile_exists(user_id).await? {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
            INSERT INTO completed_dates (user_id, date)
            VALUES (?1, ?2)
            ON CONFLICT(user_id, date) DO NOTHING
            ",
        )
        .bind(user_id.as_str())
        .bind(format_activity_date(date))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn accumulate_points(
        &self,
        user_id: &UserId,
        delta: u32,
        at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let row = sqlx::query(
            r"
            UPDATE profiles
            SET total_points = total_points + ?1,
                last_active = MAX(last_active, ?2)
            WHERE user_id = ?3
            RETURNING total_points
            ",
        )
        .bind(i64::from(delta))
        .bind(at)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let total: i64 = row.try_get("total_points").map_err(ser)?;
        u64::try_from(total)
            .map_err(|_| StorageError::Serialization(format!("invalid total_points: {total}")))
    }

    async fn top_profiles(&self, limit: u32) -> Result<Vec<Profile>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, name, grade, total_points, created_at, last_active
                FROM profiles
                ORDER BY total_points DESC, created_at ASC, user_id ASC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id = user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
            let dates = self.load_completed_dates(&user_id).await?;
            out.push(map_profile_row(&row, dates)?);
        }
        Ok(out)
    }
}
