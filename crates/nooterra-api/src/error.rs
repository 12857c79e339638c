//! Maps every core crate's error type onto the closed `ApiErrorBody` wire
//! shape (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nooterra_sse::SseError;
use nooterra_store::StoreError;
use nooterra_types::{ApiErrorBody, ErrorCode};
use nooterra_x402::X402Error;

pub struct ApiError(pub ApiErrorBody);

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(ApiErrorBody::new(code, message))
    }

    pub fn with_details(self, details: serde_json::Value) -> Self {
        Self(self.0.with_details(details))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<SseError> for ApiError {
    fn from(err: SseError) -> Self {
        match err {
            SseError::CursorConflict => ApiError::new(ErrorCode::SessionEventCursorConflict, err.to_string()),
            SseError::CursorNotFound => ApiError::new(ErrorCode::SessionEventCursorInvalid, err.to_string())
                .with_details(serde_json::json!({ "reasonCode": "SESSION_EVENT_CURSOR_NOT_FOUND" })),
            SseError::Malformed(_) => ApiError::new(ErrorCode::SessionEventCursorInvalid, err.to_string()),
        }
    }
}

impl From<X402Error> for ApiError {
    fn from(err: X402Error) -> Self {
        match err {
            X402Error::AgentFrozen => ApiError::new(ErrorCode::X402AgentFrozen, err.to_string()),
            X402Error::EscalationRequired(escalation_id) => {
                ApiError::new(ErrorCode::X402AuthorizationEscalationRequired, err.to_string())
                    .with_details(serde_json::json!({ "escalationId": escalation_id.as_str() }))
            }
            X402Error::Store(store_err) => store_err.into(),
            other => ApiError::new(ErrorCode::SchemaInvalid, other.to_string()),
        }
    }
}

impl From<nooterra_outbox::OutboxError> for ApiError {
    fn from(err: nooterra_outbox::OutboxError) -> Self {
        match err {
            nooterra_outbox::OutboxError::IdempotencyKeyRequired => {
                ApiError::new(ErrorCode::IdempotencyKeyRequired, err.to_string())
            }
            nooterra_outbox::OutboxError::IdempotencyKeyConflict(_) => {
                ApiError::new(ErrorCode::IdempotencyKeyConflict, err.to_string())
            }
            nooterra_outbox::OutboxError::Store(store_err) => store_err.into(),
            nooterra_outbox::OutboxError::X402(x402_err) => x402_err.into(),
            nooterra_outbox::OutboxError::DeliveryFailed(_) => ApiError::new(ErrorCode::Internal, err.to_string()),
        }
    }
}
