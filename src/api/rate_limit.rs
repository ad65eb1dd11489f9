use std::net::SocketAddr;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::db::RateLimitRepository;
use crate::error::AppError;

/// Minimum spacing between accepted writes from one client key.
pub const RATE_LIMIT_WINDOW_MS: i64 = 30_000;

/// Identifier used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Throttled { retry_after_ms: i64 },
}

/// Best-effort originating address of a request.
///
/// Checked in order: the trusted edge header, the first `X-Forwarded-For`
/// hop, the peer socket address, then [`UNKNOWN_CLIENT`].
pub fn client_identifier(
    headers: &HeaderMap,
    trusted_header: &str,
    peer: Option<SocketAddr>,
) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header_value(trusted_header) {
        return ip.to_string();
    }

    if let Some(first) = header_value(FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Fixed-window limiter backed by the `rate_limits` table.
///
/// Clients are tracked by a salted SHA-256 of their address so raw addresses
/// never reach storage or logs.
#[derive(Clone)]
pub struct RateLimiter {
    salt: String,
    window_ms: i64,
}

impl RateLimiter {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            window_ms: RATE_LIMIT_WINDOW_MS,
        }
    }

    /// Lowercase hex SHA-256 of `identifier|salt`.
    pub fn client_key(&self, identifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identifier.as_bytes());
        hasher.update(b"|");
        hasher.update(self.salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Admit one write for `client_key` at `now` (epoch ms).
    ///
    /// An allowed call stores `now` as the key's last timestamp. A throttled
    /// call leaves the stored timestamp untouched, so the window always runs
    /// from the last accepted write.
    pub async fn check_and_record(
        &self,
        pool: &Pool<Sqlite>,
        client_key: &str,
        now: i64,
    ) -> Result<RateLimitDecision, AppError> {
        if RateLimitRepository::try_acquire(pool, client_key, now, self.window_ms).await? {
            debug!(client_key = %client_key, now, "Rate limit slot acquired");
            return Ok(RateLimitDecision::Allowed);
        }

        let last_ts = RateLimitRepository::get_last_ts(pool, client_key)
            .await?
            .unwrap_or(now);
        let retry_after_ms = (self.window_ms - (now - last_ts)).clamp(1, self.window_ms);

        info!(client_key = %client_key, retry_after_ms, "⏳ Client throttled");

        Ok(RateLimitDecision::Throttled { retry_after_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_trusted_header_wins() {
        let h = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1, 10.0.0.1"),
        ]);
        assert_eq!(client_identifier(&h, "cf-connecting-ip", None), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let h = headers(&[("x-forwarded-for", " 198.51.100.1 , 10.0.0.1")]);
        assert_eq!(client_identifier(&h, "cf-connecting-ip", None), "198.51.100.1");
    }

    #[test]
    fn test_peer_then_unknown() {
        let peer: SocketAddr = "192.0.2.4:5555".parse().unwrap();
        assert_eq!(client_identifier(&HeaderMap::new(), "cf-connecting-ip", Some(peer)), "192.0.2.4");
        assert_eq!(client_identifier(&HeaderMap::new(), "cf-connecting-ip", None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_empty_headers_are_skipped() {
        let h = headers(&[("cf-connecting-ip", " "), ("x-forwarded-for", "")]);
        assert_eq!(client_identifier(&h, "cf-connecting-ip", None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_key_is_salted_hex_digest() {
        let limiter = RateLimiter::new("pepper");
        let key = limiter.client_key("203.0.113.7");

        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key, limiter.client_key("203.0.113.7"));
        assert_ne!(key, limiter.client_key("203.0.113.8"));
        assert_ne!(key, RateLimiter::new("salt").client_key("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_second_write_in_window_is_throttled() {
        let pool = db::in_memory().await.unwrap();
        let limiter = RateLimiter::new("pepper");
        let key = limiter.client_key("203.0.113.7");

        let first = limiter.check_and_record(&pool, &key, 100_000).await.unwrap();
        assert_eq!(first, RateLimitDecision::Allowed);

        let second = limiter.check_and_record(&pool, &key, 110_000).await.unwrap();
        assert_eq!(second, RateLimitDecision::Throttled { retry_after_ms: 20_000 });
    }

    #[tokio::test]
    async fn test_throttled_attempt_does_not_extend_window() {
        let pool = db::in_memory().await.unwrap();
        let limiter = RateLimiter::new("pepper");
        let key = limiter.client_key("203.0.113.7");

        limiter.check_and_record(&pool, &key, 100_000).await.unwrap();
        limiter.check_and_record(&pool, &key, 129_999).await.unwrap();

        assert_eq!(
            RateLimitRepository::get_last_ts(&pool, &key).await.unwrap(),
            Some(100_000)
        );
        let decision = limiter.check_and_record(&pool, &key, 130_000).await.unwrap();
        assert_eq!(decision, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn test_retry_hint_stays_within_window() {
        let pool = db::in_memory().await.unwrap();
        let limiter = RateLimiter::new("pepper");
        let key = limiter.client_key("203.0.113.7");

        limiter.check_and_record(&pool, &key, 100_000).await.unwrap();

        // Same instant and a clock that stepped backwards
        for now in [100_000, 90_000] {
            match limiter.check_and_record(&pool, &key, now).await.unwrap() {
                RateLimitDecision::Throttled { retry_after_ms } => {
                    assert!(retry_after_ms > 0 && retry_after_ms <= RATE_LIMIT_WINDOW_MS);
                }
                RateLimitDecision::Allowed => panic!("expected throttle at {}", now),
            }
        }
    }

    #[tokio::test]
    async fn test_distinct_clients_do_not_share_window() {
        let pool = db::in_memory().await.unwrap();
        let limiter = RateLimiter::new("pepper");

        for ip in ["203.0.113.7", "203.0.113.8"] {
            let key = limiter.client_key(ip);
            let decision = limiter.check_and_record(&pool, &key, 100_000).await.unwrap();
            assert_eq!(decision, RateLimitDecision::Allowed);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_admit_exactly_one() {
        let path = std::env::temp_dir().join(format!(
            "shoutbox-race-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let url = format!("sqlite://{}", path.display());
        let config = crate::config::Config::from_lookup(|key| match key {
            "RATE_LIMIT_SALT" => Some("pepper".to_string()),
            "DATABASE_URL" => Some(url.clone()),
            "DB_MAX_CONNECTIONS" => Some("2".to_string()),
            "DB_MIN_CONNECTIONS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();

        let pool = db::init_pool(&config).await.unwrap();
        db::migrate(&pool).await.unwrap();

        let limiter = RateLimiter::new("pepper");
        let key = limiter.client_key("203.0.113.7");

        for round in 0..20 {
            let now = 100_000 + round * RATE_LIMIT_WINDOW_MS;
            let (a, b) = tokio::join!(
                limiter.check_and_record(&pool, &key, now),
                limiter.check_and_record(&pool, &key, now),
            );
            let allowed = [a.unwrap(), b.unwrap()]
                .iter()
                .filter(|d| **d == RateLimitDecision::Allowed)
                .count();
            assert_eq!(allowed, 1, "round {}", round);
        }

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
