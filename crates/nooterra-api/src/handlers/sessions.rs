//! `POST /sessions`, `POST /sessions/:id/events`, `GET
//! /sessions/:id/events/stream` (spec §4.1, §4.2, §4.4, §6).

use crate::error::ApiError;
use crate::extract::{self, tenant_id};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as AxumSseEvent, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, StreamExt};
use nooterra_chain::{append, create_event, CreateEventInput};
use nooterra_sse::{session_stream, EventFilter, SseFrame};
use nooterra_store::{CommitTx, Op, Session, Visibility};
use nooterra_types::{ErrorCode, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub participants: BTreeSet<String>,
}

fn default_visibility() -> Visibility {
    Visibility::Tenant
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub visibility: Visibility,
    pub participants: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
    pub revision: u64,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.session_id.as_str().to_string(),
            visibility: s.visibility,
            participants: s.participants.iter().map(|a| a.as_str().to_string()).collect(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            revision: s.revision,
        }
    }
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let now = extract::now_rfc3339();
    let session_id = SessionId::new(body.session_id);

    if state.store.get_session(&tenant, &session_id).await?.is_some() {
        return Err(ApiError::new(ErrorCode::SchemaInvalid, "session already exists"));
    }

    let session = Session {
        tenant_id: tenant,
        session_id,
        visibility: body.visibility,
        participants: body.participants.into_iter().map(nooterra_types::AgentId::new).collect(),
        created_at: now.clone(),
        updated_at: now.clone(),
        last_event_id: None,
        last_chain_hash: None,
        revision: 1,
    };

    state
        .store
        .commit_tx(CommitTx {
            at: now,
            ops: vec![Op::SessionCreate(session.clone())],
        })
        .await?;

    Ok(Json(session.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventRequest {
    pub event_type: String,
    pub actor: String,
    pub payload: serde_json::Value,
}

pub async fn append_event(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AppendEventRequest>,
) -> Result<Json<nooterra_chain::ChainedEvent>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let idempotency_key = extract::idempotency_key(&headers);
    let request_value = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);

    let check = nooterra_outbox::idempotency::check_idempotency_key(
        state.store.as_ref(),
        &tenant,
        idempotency_key.as_deref(),
        &request_value,
    )
    .await?;
    if let nooterra_outbox::idempotency::IdempotencyCheck::Replay(response) = check {
        return Ok(Json(serde_json::from_value(response).map_err(|_| {
            ApiError::new(ErrorCode::Internal, "corrupt idempotency record")
        })?));
    }

    let session_id = SessionId::new(session_id);
    let session = state
        .store
        .get_session(&tenant, &session_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::SchemaInvalid, "session not found"))?;
    let stream_id = session.stream_id();

    let existing_events = state.store.get_stream_events(&tenant, &stream_id).await?;

    if let Some(expected) = extract::expected_prev_chain_hash(&headers) {
        let actual = existing_events.last().map(|e| e.chain_hash.clone());
        if actual.as_deref() != Some(expected.as_str()) && !(actual.is_none() && expected.is_empty()) {
            return Err(ApiError::new(
                ErrorCode::SessionEventCursorConflict,
                "expected previous chain hash does not match the current stream head",
            ));
        }
    }

    let draft = create_event(CreateEventInput {
        stream_id: stream_id.clone(),
        event_type: body.event_type,
        actor: body.actor,
        payload: body.payload,
        at: None,
        id: None,
    });
    let extended = append(&existing_events, draft, Some(state.signer.as_ref()))
        .await
        .map_err(|e| ApiError::new(ErrorCode::SchemaInvalid, e.to_string()))?;
    let event = extended.last().expect("append always grows the chain").clone();

    let now = extract::now_rfc3339();
    state
        .store
        .commit_tx(CommitTx {
            at: now.clone(),
            ops: vec![Op::SessionAppendEvent {
                tenant_id: tenant.clone(),
                session_id: session_id.clone(),
                stream_id: stream_id.clone(),
                event: event.clone(),
            }],
        })
        .await?;

    session_stream::publish_session_event(
        &state.session_broadcaster,
        session_stream::SessionEventPublished {
            stream_id,
            event: event.clone(),
        },
    );

    if let Some(key) = idempotency_key {
        let response_value = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        nooterra_outbox::idempotency::record_response(
            state.store.as_ref(),
            &tenant,
            &key,
            &request_value,
            response_value,
            &now,
        )
        .await?;
    }

    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "sinceEventId", alias = "sinceCursor")]
    pub since_event_id: Option<String>,
}

pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_id(&headers)?;
    let session_id = SessionId::new(session_id);
    let session = state
        .store
        .get_session(&tenant, &session_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::SchemaInvalid, "session not found"))?;
    let stream_id = session.stream_id();

    // Subscribe before reading history: any event committed between the
    // subscribe call and the read below lands in both `events` and the live
    // subscription, and is deduped below rather than lost in the gap.
    let live = session_stream::subscribe_live(&state.session_broadcaster, stream_id.clone());
    let events = state.store.get_stream_events(&tenant, &stream_id).await?;

    let last_event_id_header = headers.get("last-event-id").and_then(|v| v.to_str().ok());

    let plan = session_stream::plan_resume(
        &stream_id,
        &events,
        &EventFilter::default(),
        last_event_id_header,
        query.since_event_id.as_deref(),
    )?;

    let ready = SseFrame::without_cursor("session.ready", &plan.head);
    let already_delivered = plan.head.head_last_event_id.clone();

    let initial = stream::iter(std::iter::once(ready).chain(plan.backfill.into_iter()));
    let tail = stream::unfold(
        (live.subscription, already_delivered),
        |(mut sub, last_delivered)| async move {
            loop {
                let frame = sub.recv().await?;
                if let SseFrame::Event { id: Some(id), .. } = &frame {
                    if last_delivered.as_deref().is_some_and(|last| id.as_str() <= last) {
                        continue;
                    }
                }
                return Some((frame, (sub, last_delivered)));
            }
        },
    );

    let frames = initial.chain(tail).map(frame_to_sse_event);
    Ok(Sse::new(frames).keep_alive(axum::response::sse::KeepAlive::default()))
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
