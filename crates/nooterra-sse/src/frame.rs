//! RFC 8895 `text/event-stream` frame rendering (spec §4.4, §6).

use serde::Serialize;

/// One `event:`/`id:`/`data:` frame, or a `:`-prefixed comment used as a
/// keep-alive. Frames are separated by a blank line on the wire.
#[derive(Debug, Clone)]
pub enum SseFrame {
    Event {
        event: String,
        id: Option<String>,
        data: serde_json::Value,
    },
    KeepAlive,
}

impl SseFrame {
    pub fn event(event: impl Into<String>, id: impl Into<String>, data: impl Serialize) -> Self {
        Self::Event {
            event: event.into(),
            id: Some(id.into()),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// A frame with no `id:` - the initial `session.ready`/`agent_cards.ready`
    /// head snapshot, which does not bear a resume cursor.
    pub fn without_cursor(event: impl Into<String>, data: impl Serialize) -> Self {
        Self::Event {
            event: event.into(),
            id: None,
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn keep_alive() -> Self {
        Self::KeepAlive
    }

    /// Renders this frame as wire bytes, terminated by a blank line.
    pub fn to_wire(&self) -> String {
        match self {
            SseFrame::KeepAlive => ": keep-alive\n\n".to_string(),
            SseFrame::Event { event, id, data } => {
                let mut out = String::new();
                out.push_str("event: ");
                out.push_str(event);
                out.push('\n');
                if let Some(id) = id {
                    out.push_str("id: ");
                    out.push_str(id);
                    out.push('\n');
                }
                let body = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
                for line in body.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                out
            }
        }
    }
}

/// The head snapshot repeated in the first `*.ready` frame and in the SSE
/// response headers (spec §4.4).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadSnapshot {
    pub ordering: &'static str,
    pub delivery_mode: &'static str,
    pub head_event_count: u64,
    pub head_first_event_id: Option<String>,
    pub head_last_event_id: Option<String>,
    pub since_event_id: Option<String>,
    pub next_since_event_id: Option<String>,
}

impl HeadSnapshot {
    pub const ORDERING: &'static str = "SESSION_SEQ_ASC";
    pub const DELIVERY_MODE: &'static str = "resume_then_tail";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_renders_expected_shape() {
        let frame = SseFrame::event("session.event", "evt_1", serde_json::json!({"a": 1}));
        let wire = frame.to_wire();
        assert_eq!(wire, "event: session.event\nid: evt_1\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn ready_frame_has_no_id_line() {
        let frame = SseFrame::without_cursor("session.ready", serde_json::json!({}));
        assert!(!frame.to_wire().contains("id:"));
    }

    #[test]
    fn keep_alive_is_a_comment_line() {
        assert_eq!(SseFrame::keep_alive().to_wire(), ": keep-alive\n\n");
    }
}
