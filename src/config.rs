use crate::error::AppError;

/// Placeholder salt that must never reach production.
pub const PLACEHOLDER_SALT: &str = "change-me";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    /// Origins allowed by the CORS layer; `["*"]` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    /// Edge-injected header carrying the connecting client's address.
    pub client_ip_header: String,
    pub rate_limit_salt: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let rate_limit_salt = lookup("RATE_LIMIT_SALT").unwrap_or_default();
        if rate_limit_salt.trim().is_empty() || rate_limit_salt == PLACEHOLDER_SALT {
            return Err(AppError::Config(
                "RATE_LIMIT_SALT must be set to a non-default secret".to_string(),
            ));
        }

        Ok(Config {
            server_host: var("SERVER_HOST", "127.0.0.1"),
            server_port: var("SERVER_PORT", "8080")
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?,
            database_url: var("DATABASE_URL", "sqlite://shoutbox.db"),
            db_max_connections: var("DB_MAX_CONNECTIONS", "10")
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid DB_MAX_CONNECTIONS: {}", e)))?,
            db_min_connections: var("DB_MIN_CONNECTIONS", "1")
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid DB_MIN_CONNECTIONS: {}", e)))?,
            request_timeout_secs: var("REQUEST_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid REQUEST_TIMEOUT_SECS: {}", e)))?,
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            client_ip_header: var("CLIENT_IP_HEADER", "cf-connecting-ip").to_lowercase(),
            rate_limit_salt,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|origin| origin == "*")
    }
}
