//! `GET /public/agent-cards/stream` (spec §4.4, §6).

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::sse::{Event as AxumSseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, StreamExt};
use nooterra_sse::{agent_card_stream, SseFrame};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CardStreamQuery {
    #[serde(rename = "sinceAgentId")]
    pub since_agent_id: Option<String>,
}

pub async fn stream_agent_cards(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CardStreamQuery>,
) -> impl IntoResponse {
    let cards = state
        .store
        .list_public_agent_cards()
        .await
        .unwrap_or_default();
    let (head, backfill) = agent_card_stream::plan_card_resume(&cards, query.since_agent_id.as_deref());

    let ready = SseFrame::without_cursor("agent_cards.ready", &head);
    let subscription = state
        .card_broadcaster
        .subscribe(agent_card_stream::PUBLIC_STREAM_KEY);

    let initial = stream::iter(std::iter::once(ready).chain(backfill.into_iter()));
    let tail = stream::unfold(subscription, |mut sub| async move {
        sub.recv().await.map(|frame| (frame, sub))
    });

    let frames = initial.chain(tail).map(frame_to_sse_event);
    Sse::new(frames).keep_alive(KeepAlive::default())
}

fn frame_to_sse_event(frame: SseFrame) -> Result<AxumSseEvent, Infallible> {
    match frame {
        SseFrame::KeepAlive => Ok(AxumSseEvent::default().comment("keep-alive")),
        SseFrame::Event { event, id, data } => {
            let body = serde_json::to_string(&data).unwrap_or_else(|_| "null".to_string());
            let mut built = AxumSseEvent::default().event(event).data(body);
            if let Some(id) = id {
                built = built.id(id);
            }
            Ok(built)
        }
    }
}
