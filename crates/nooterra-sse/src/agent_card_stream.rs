//! `GET /public/agent-cards/stream` (spec §4.4): upserts, removals, and the
//! `NO_LONGER_VISIBLE` terminal-removal rule for visibility changes.

use crate::broadcaster::Broadcaster;
use crate::frame::{HeadSnapshot, SseFrame};
use nooterra_store::AgentCard;

/// All public card-stream subscribers share one key - there is exactly one
/// public stream, unlike per-session event streams.
pub const PUBLIC_STREAM_KEY: &str = "public_agent_cards";

pub type AgentCardBroadcaster = Broadcaster<&'static str>;

#[derive(Debug, Clone)]
pub enum AgentCardChange {
    Upsert(AgentCard),
    /// A card leaving scope. `reason_code` is `"NO_LONGER_VISIBLE"` for a
    /// visibility change and the card's own removal reason otherwise.
    Removed {
        tenant_id: String,
        agent_id: String,
        reason_code: String,
    },
}

pub fn publish_agent_card_change(broadcaster: &AgentCardBroadcaster, change: AgentCardChange) {
    let frame = match &change {
        AgentCardChange::Upsert(card) => {
            SseFrame::event("agent_card.upsert", card.agent_id.as_str(), card)
        }
        AgentCardChange::Removed {
            agent_id,
            reason_code,
            ..
        } => SseFrame::event(
            "agent_card.removed",
            agent_id.as_str(),
            serde_json::json!({ "agentId": agent_id, "reasonCode": reason_code }),
        ),
    };
    broadcaster.publish(&PUBLIC_STREAM_KEY, frame);
}

/// Builds the `agent_cards.ready` head snapshot and the from-head or
/// resume-after backfill over the current public card list, ordered by
/// `(updatedAt ASC, entityId ASC)` as the store already guarantees.
pub fn plan_card_resume(cards: &[AgentCard], since_agent_id: Option<&str>) -> (HeadSnapshot, Vec<SseFrame>) {
    let head_first = cards.first().map(|c| c.agent_id.as_str().to_string());
    let head_last = cards.last().map(|c| c.agent_id.as_str().to_string());

    let backfill = match since_agent_id {
        None => Vec::new(),
        Some(after) => {
            let start = cards
                .iter()
                .position(|c| c.agent_id.as_str() == after)
                .map(|i| i + 1)
                .unwrap_or(0);
            cards[start..]
                .iter()
                .map(|c| SseFrame::event("agent_card.upsert", c.agent_id.as_str(), c))
                .collect()
        }
    };

    let head = HeadSnapshot {
        ordering: HeadSnapshot::ORDERING,
        delivery_mode: HeadSnapshot::DELIVERY_MODE,
        head_event_count: cards.len() as u64,
        head_first_event_id: head_first,
        head_last_event_id: head_last,
        since_event_id: since_agent_id.map(str::to_string),
        next_since_event_id: backfill
            .last()
            .and_then(|f| match f {
                SseFrame::Event { id, .. } => id.clone(),
                SseFrame::KeepAlive => None,
            })
            .or(since_agent_id.map(str::to_string)),
    };

    (head, backfill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_store::Visibility;
    use nooterra_types::{AgentId, TenantId};

    fn card(id: &str, updated_at: &str) -> AgentCard {
        AgentCard {
            tenant_id: TenantId::new("t1"),
            agent_id: AgentId::new(id),
            visibility: Visibility::Public,
            capabilities: vec![],
            host: "https://example.invalid".into(),
            tools: vec![],
            updated_at: updated_at.into(),
            revision: 1,
            removed: false,
        }
    }

    #[test]
    fn removal_frame_carries_no_longer_visible_reason() {
        let broadcaster = AgentCardBroadcaster::new();
        let mut sub = broadcaster.subscribe(PUBLIC_STREAM_KEY);
        publish_agent_card_change(
            &broadcaster,
            AgentCardChange::Removed {
                tenant_id: "t1".into(),
                agent_id: "agent_a".into(),
                reason_code: "NO_LONGER_VISIBLE".into(),
            },
        );
        let frame = sub.try_recv();
        assert!(matches!(frame, Some(SseFrame::Event { event, .. }) if event == "agent_card.removed"));
    }

    #[test]
    fn resume_after_returns_only_newer_cards() {
        let cards = vec![card("a", "2026-01-01T00:00:00Z"), card("b", "2026-01-02T00:00:00Z")];
        let (_, backfill) = plan_card_resume(&cards, Some("a"));
        assert_eq!(backfill.len(), 1);
    }
}
