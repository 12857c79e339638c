//! Resume-cursor resolution and validation (spec §4.4).

use crate::error::{SseError, SseResult};
use nooterra_chain::ChainedEvent;

/// Either a null cursor (tail from head) or a specific event id to resume
/// after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCursor {
    FromHead,
    After(String),
}

/// Merges the `Last-Event-ID` header and a `sinceEventId`/`sinceCursor`
/// query parameter into one cursor. Supplying both is a client error
/// regardless of whether they agree.
pub fn resolve_cursor(
    last_event_id_header: Option<&str>,
    since_query: Option<&str>,
) -> SseResult<ResumeCursor> {
    match (last_event_id_header, since_query) {
        (Some(_), Some(_)) => Err(SseError::CursorConflict),
        (Some(id), None) | (None, Some(id)) => {
            let id = id.trim();
            if id.is_empty() {
                return Err(SseError::Malformed("cursor must not be blank".into()));
            }
            Ok(ResumeCursor::After(id.to_string()))
        }
        (None, None) => Ok(ResumeCursor::FromHead),
    }
}

/// Validates a resume cursor against the stream's known events, returning
/// the index to resume *after* (exclusive) or `None` for a from-head cursor.
pub fn validate_cursor(
    cursor: &ResumeCursor,
    events: &[ChainedEvent],
) -> SseResult<Option<usize>> {
    match cursor {
        ResumeCursor::FromHead => Ok(None),
        ResumeCursor::After(id) => events
            .iter()
            .position(|e| e.id.as_str() == id)
            .map(Some)
            .ok_or(SseError::CursorNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_present_is_conflict() {
        assert!(matches!(
            resolve_cursor(Some("a"), Some("b")),
            Err(SseError::CursorConflict)
        ));
    }

    #[test]
    fn neither_present_is_from_head() {
        assert_eq!(resolve_cursor(None, None).unwrap(), ResumeCursor::FromHead);
    }

    #[test]
    fn header_alone_resumes_after_id() {
        assert_eq!(
            resolve_cursor(Some("evt_1"), None).unwrap(),
            ResumeCursor::After("evt_1".into())
        );
    }

    #[test]
    fn blank_cursor_is_malformed() {
        assert!(matches!(
            resolve_cursor(Some("   "), None),
            Err(SseError::Malformed(_))
        ));
    }
}
