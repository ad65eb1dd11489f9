use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Too many requests, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: i64 },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body rejected: {0}")]
    Body(#[from] axum::extract::rejection::BytesRejection),

    #[error("Request timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Whole seconds for a `Retry-After` header, rounded up.
pub fn retry_after_secs(retry_after_ms: i64) -> i64 {
    (retry_after_ms.max(0) + 999) / 1000
}

// Every failure renders as an `{ "ok": false, ... }` envelope
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{header, StatusCode};

        let (status, body) = match &self {
            AppError::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "ok": false, "error": "Invalid JSON" }),
            ),
            AppError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "ok": false, "error": reason }),
            ),
            AppError::RateLimited { retry_after_ms } => {
                let body = serde_json::json!({
                    "ok": false,
                    "error": "Too many requests",
                    "retry_after_ms": retry_after_ms,
                });
                let retry_after = retry_after_secs(*retry_after_ms).to_string();
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after)],
                    axum::Json(body),
                )
                    .into_response();
            }
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                serde_json::json!({ "ok": false, "error": "Method not allowed" }),
            ),
            AppError::Body(rejection) => {
                let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    "Payload too large"
                } else {
                    "Invalid request body"
                };
                (
                    rejection.status(),
                    serde_json::json!({ "ok": false, "error": error }),
                )
            }
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                serde_json::json!({ "ok": false, "error": "Request timed out" }),
            ),
            AppError::Config(detail) => {
                server_error("Configuration error", detail.clone())
            }
            AppError::Database(err) => server_error("Database error", err.to_string()),
            AppError::Migration(err) => server_error("Database error", err.to_string()),
            AppError::Internal(detail) => server_error("Internal error", detail.clone()),
        };

        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn server_error(error: &str, detail: String) -> (axum::http::StatusCode, serde_json::Value) {
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "ok": false, "error": error, "detail": detail }),
    )
}
