use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RateLimitEntry {
    pub ip_hash: String,
    pub last_ts: i64,
}
