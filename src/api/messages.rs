use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::rate_limit::{client_identifier, RateLimitDecision};
use crate::api::state::AppState;
use crate::db::{Message, MessageRepository};
use crate::error::AppError;

pub const MAX_TEXT_CHARS: usize = 50;
pub const RECENT_LIMIT: i64 = 10;
pub const TEXT_LENGTH_ERROR: &str = "Text must be 1-50 chars";

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub ok: bool,
    pub data: Vec<Message>,
}

/// Trim the text and collapse every whitespace run to a single space.
pub fn normalize_text(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Only a JSON object is accepted; arrays and scalars are invalid.
pub fn parse_request(body: &[u8]) -> Result<CreateMessageRequest, AppError> {
    match serde_json::from_slice::<serde_json::Value>(body)? {
        value @ serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Err(AppError::InvalidJson(serde::de::Error::custom(
            "expected a JSON object",
        ))),
    }
}

/// Length is counted in characters, not bytes.
pub fn validate_text(text: &str) -> Result<(), AppError> {
    let len = text.chars().count();

    if len == 0 || len > MAX_TEXT_CHARS {
        return Err(AppError::Validation(TEXT_LENGTH_ERROR.to_string()));
    }

    Ok(())
}

/// POST /api/messages
pub async fn create_message(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<CreateMessageResponse>, AppError> {
    let req = parse_request(&body?)?;

    let text = normalize_text(req.text.as_deref());
    validate_text(&text)?;

    let identifier = client_identifier(
        &headers,
        &state.config.client_ip_header,
        peer.map(|ConnectInfo(addr)| addr),
    );
    let client_key = state.rate_limiter.client_key(&identifier);
    let now = chrono::Utc::now().timestamp_millis();

    if let RateLimitDecision::Throttled { retry_after_ms } = state
        .rate_limiter
        .check_and_record(&state.db, &client_key, now)
        .await?
    {
        return Err(AppError::RateLimited { retry_after_ms });
    }

    let message = MessageRepository::create(&state.db, &text, now).await?;
    tracing::debug!(message_id = message.id, chars = text.chars().count(), "Message stored");

    Ok(Json(CreateMessageResponse { ok: true }))
}

/// GET /api/messages
pub async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<ListMessagesResponse>, AppError> {
    let messages = MessageRepository::get_recent(&state.db, RECENT_LIMIT).await?;

    Ok(Json(ListMessagesResponse {
        ok: true,
        data: messages,
    }))
}
