use sqlx::{Pool, Sqlite};
use crate::db::models::RateLimitEntry;
use crate::error::AppError;

pub struct RateLimitRepository;

impl RateLimitRepository {
    pub async fn get(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
    ) -> Result<Option<RateLimitEntry>, AppError> {
        let entry = sqlx::query_as::<_, RateLimitEntry>(
            "SELECT ip_hash, last_ts FROM rate_limits WHERE ip_hash = ?"
        )
        .bind(ip_hash)
        .fetch_optional(pool)
        .await?;

        Ok(entry)
    }

    pub async fn get_last_ts(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
    ) -> Result<Option<i64>, AppError> {
        Ok(Self::get(pool, ip_hash).await?.map(|entry| entry.last_ts))
    }

    /// Record `now` for `ip_hash` only if the row is absent or at least
    /// `window_ms` old. Returns whether a row was written.
    pub async fn try_acquire(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
        now: i64,
        window_ms: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
INSERT INTO rate_limits (ip_hash, last_ts)
VALUES (?, ?)
ON CONFLICT(ip_hash) DO UPDATE SET last_ts = excluded.last_ts
WHERE excluded.last_ts - rate_limits.last_ts >= ?
            "#,
        )
        .bind(ip_hash)
        .bind(now)
        .bind(window_ms)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
