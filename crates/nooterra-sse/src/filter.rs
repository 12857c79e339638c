//! Candidate-event filtering for session streams (spec §4.4).
//!
//! A filtered-out event still advances the watermark; it is never silently
//! dropped from the resume sequence.

use nooterra_chain::ChainedEvent;

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub runtime: Option<String>,
    pub capability: Option<String>,
    pub tool_id: Option<String>,
    pub tool_side_effecting: Option<bool>,
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.runtime.is_none()
            && self.capability.is_none()
            && self.tool_id.is_none()
            && self.tool_side_effecting.is_none()
    }

    /// Whether `event` passes every constraint this filter sets. Constraints
    /// left `None` are not checked. A constraint whose field is absent from
    /// the event's payload never matches.
    pub fn matches(&self, event: &ChainedEvent) -> bool {
        if let Some(want) = &self.event_type {
            if &event.event_type != want {
                return false;
            }
        }
        if let Some(want) = &self.runtime {
            if event.payload.get("runtime").and_then(|v| v.as_str()) != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.capability {
            if event.payload.get("capability").and_then(|v| v.as_str()) != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.tool_id {
            if event.payload.get("toolId").and_then(|v| v.as_str()) != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = self.tool_side_effecting {
            if event.payload.get("toolSideEffecting").and_then(|v| v.as_bool()) != Some(want) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_chain::{append, create_event, CreateEventInput};
    use nooterra_types::StreamId;

    async fn sample_event(event_type: &str, payload: serde_json::Value) -> ChainedEvent {
        let draft = create_event(CreateEventInput {
            stream_id: StreamId::new("session:s1"),
            event_type: event_type.into(),
            actor: "agent_a".into(),
            payload,
            at: None,
            id: None,
        });
        append(&[], draft, None).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn event_type_mismatch_fails() {
        let event = sample_event("tool.invoked", serde_json::json!({})).await;
        let filter = EventFilter {
            event_type: Some("tool.completed".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }

    #[tokio::test]
    async fn empty_filter_matches_everything() {
        let event = sample_event("tool.invoked", serde_json::json!({})).await;
        assert!(EventFilter::default().matches(&event));
    }

    #[tokio::test]
    async fn tool_id_and_side_effecting_constraints() {
        let event = sample_event(
            "tool.invoked",
            serde_json::json!({"toolId": "t1", "toolSideEffecting": true}),
        )
        .await;
        let filter = EventFilter {
            tool_id: Some("t1".into()),
            tool_side_effecting: Some(true),
            ..Default::default()
        };
        assert!(filter.matches(&event));

        let filter = EventFilter {
            tool_side_effecting: Some(false),
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }
}
