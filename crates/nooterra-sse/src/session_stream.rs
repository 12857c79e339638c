//! `resume_then_tail` assembly for `GET /sessions/:id/events/stream`
//! (spec §4.4).

use crate::broadcaster::{Broadcaster, Subscription};
use crate::cursor::{resolve_cursor, validate_cursor, ResumeCursor};
use crate::error::SseResult;
use crate::filter::EventFilter;
use crate::frame::{HeadSnapshot, SseFrame};
use nooterra_chain::ChainedEvent;
use nooterra_types::StreamId;

/// Keys a session broadcaster by its chain stream id, e.g. `session:s1`.
pub type SessionBroadcaster = Broadcaster<StreamId>;

/// A notification published to session subscribers whenever `append`
/// commits a new event to that stream.
#[derive(Debug, Clone)]
pub struct SessionEventPublished {
    pub stream_id: StreamId,
    pub event: ChainedEvent,
}

pub fn publish_session_event(broadcaster: &SessionBroadcaster, notification: SessionEventPublished) {
    broadcaster.publish(
        &notification.stream_id,
        SseFrame::event(
            "session.event",
            notification.event.id.as_str(),
            &notification.event,
        ),
    );
}

/// Resolves the resume cursor and the historical backfill frames for a
/// newly-opened session stream. `events` is the stream's full history in
/// append order. Returns the head-snapshot headers, the backfill frame
/// sequence (empty for a from-head cursor), and the `nextSinceEventId` to
/// report.
pub struct ResumePlan {
    pub head: HeadSnapshot,
    pub backfill: Vec<SseFrame>,
}

pub fn plan_resume(
    stream_id: &StreamId,
    events: &[ChainedEvent],
    filter: &EventFilter,
    last_event_id_header: Option<&str>,
    since_query: Option<&str>,
) -> SseResult<ResumePlan> {
    let cursor = resolve_cursor(last_event_id_header, since_query)?;
    let resume_after = validate_cursor(&cursor, events)?;

    let head_first = events.first().map(|e| e.id.as_str().to_string());
    let head_last = events.last().map(|e| e.id.as_str().to_string());
    let since_event_id = match &cursor {
        ResumeCursor::FromHead => None,
        ResumeCursor::After(id) => Some(id.clone()),
    };

    let backfill = match resume_after {
        None => Vec::new(),
        Some(start_index) => {
            let mut frames = Vec::new();
            for event in &events[start_index + 1..] {
                if filter.matches(event) {
                    frames.push(SseFrame::event("session.event", event.id.as_str(), event));
                } else {
                    frames.push(SseFrame::event(
                        "session.watermark",
                        event.id.as_str(),
                        serde_json::json!({ "lastObservedEventId": event.id.as_str() }),
                    ));
                }
            }
            frames
        }
    };

    let next_since_event_id = backfill
        .last()
        .and_then(|f| match f {
            SseFrame::Event { id, .. } => id.clone(),
            SseFrame::KeepAlive => None,
        })
        .or_else(|| head_last.clone());

    let head = HeadSnapshot {
        ordering: HeadSnapshot::ORDERING,
        delivery_mode: HeadSnapshot::DELIVERY_MODE,
        head_event_count: events.len() as u64,
        head_first_event_id: head_first,
        head_last_event_id: head_last,
        since_event_id,
        next_since_event_id,
    };

    let _ = stream_id;
    Ok(ResumePlan { head, backfill })
}

pub struct LiveSubscription {
    pub subscription: Subscription,
}

pub fn subscribe_live(broadcaster: &SessionBroadcaster, stream_id: StreamId) -> LiveSubscription {
    LiveSubscription {
        subscription: broadcaster.subscribe(stream_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_chain::{append, create_event, CreateEventInput};

    async fn chain(n: usize) -> Vec<ChainedEvent> {
        let mut events = Vec::new();
        for i in 0..n {
            let draft = create_event(CreateEventInput {
                stream_id: StreamId::new("session:s1"),
                event_type: "tool.invoked".into(),
                actor: "agent_a".into(),
                payload: serde_json::json!({ "seq": i }),
                at: None,
                id: None,
            });
            events = append(&events, draft, None).await.unwrap();
        }
        events
    }

    #[tokio::test]
    async fn from_head_cursor_yields_no_backfill() {
        let events = chain(3).await;
        let stream_id = StreamId::new("session:s1");
        let plan = plan_resume(&stream_id, &events, &EventFilter::default(), None, None).unwrap();
        assert!(plan.backfill.is_empty());
        assert_eq!(plan.head.head_event_count, 3);
    }

    #[tokio::test]
    async fn resume_after_cursor_yields_exact_suffix() {
        let events = chain(4).await;
        let stream_id = StreamId::new("session:s1");
        let cursor_id = events[1].id.as_str().to_string();
        let plan = plan_resume(
            &stream_id,
            &events,
            &EventFilter::default(),
            Some(&cursor_id),
            None,
        )
        .unwrap();
        assert_eq!(plan.backfill.len(), 2);
    }

    #[tokio::test]
    async fn missing_cursor_is_rejected() {
        let events = chain(1).await;
        let stream_id = StreamId::new("session:s1");
        let err = plan_resume(
            &stream_id,
            &events,
            &EventFilter::default(),
            Some("evt_missing"),
            None,
        );
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn filtered_out_suffix_events_become_watermarks() {
        let events = chain(3).await;
        let stream_id = StreamId::new("session:s1");
        let filter = EventFilter {
            event_type: Some("tool.completed".into()),
            ..Default::default()
        };
        let plan = plan_resume(&stream_id, &events, &filter, None, Some(&events[0].id.as_str().to_string())).unwrap();
        assert!(plan
            .backfill
            .iter()
            .all(|f| matches!(f, SseFrame::Event { event, .. } if event == "session.watermark")));
    }
}
