use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::api::rate_limit::RateLimiter;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_salt.clone());

        Self {
            db,
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        }
    }
}
