use thiserror::Error;

/// Reasons a resume cursor fails validation (spec §4.4). `CursorConflict`
/// and `CursorInvalid` map onto `SESSION_EVENT_CURSOR_CONFLICT` /
/// `SESSION_EVENT_CURSOR_INVALID` at the API boundary.
#[derive(Debug, Error)]
pub enum SseError {
    #[error("both Last-Event-ID and a since-cursor query parameter were supplied")]
    CursorConflict,
    #[error("cursor does not refer to an existing event")]
    CursorNotFound,
    #[error("cursor is malformed: {0}")]
    Malformed(String),
}

pub type SseResult<T> = Result<T, SseError>;
