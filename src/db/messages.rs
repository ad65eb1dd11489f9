use sqlx::{Pool, Sqlite};
use crate::db::models::Message;
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        text: &str,
        created_at: i64,
    ) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
INSERT INTO messages (text, created_at)
VALUES (?, ?)
RETURNING id, text, created_at
            "#,
        )
        .bind(text)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Newest first; `id` breaks ties between equal timestamps.
    pub async fn get_recent(
        pool: &Pool<Sqlite>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT id, text, created_at
FROM messages
ORDER BY created_at DESC, id DESC
LIMIT ?
            "#
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }
}
