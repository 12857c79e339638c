//! Chain operations: `create_event`, `append`, `verify` (spec §4.2).

use crate::error::{AppendError, ChainIntegrityError, ChainIntegrityReason};
use crate::event::{ChainedEvent, DraftEvent};
use nooterra_crypto::{sha256_bytes, sha256_of_value, verify_envelope, PublicKey, Signer, SigningPurpose};
use nooterra_types::{EventId, StreamId, EVENT_SCHEMA_VERSION};
use serde_json::Value;
use std::collections::HashMap;

/// Inputs to [`create_event`]. `id` and `at` default to a generated ULID and
/// the current UTC instant when omitted.
pub struct CreateEventInput {
    pub stream_id: StreamId,
    pub event_type: String,
    pub actor: String,
    pub payload: Value,
    pub at: Option<String>,
    pub id: Option<EventId>,
}

pub fn create_event(input: CreateEventInput) -> DraftEvent {
    let id = input
        .id
        .unwrap_or_else(|| EventId::new(ulid::Ulid::new().to_string()));
    let at = input
        .at
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    DraftEvent {
        v: EVENT_SCHEMA_VERSION,
        id,
        stream_id: input.stream_id,
        event_type: input.event_type,
        at,
        actor: input.actor,
        payload: input.payload,
    }
}

/// Finalize `draft` against the tail of `events` (same stream), signing it
/// if `signer` is supplied, and return the extended sequence. `events` must
/// already be a valid, ordered chain for a single stream.
pub async fn append(
    events: &[ChainedEvent],
    draft: DraftEvent,
    signer: Option<&dyn Signer>,
) -> Result<Vec<ChainedEvent>, AppendError> {
    if let Some(last) = events.last() {
        if last.stream_id != draft.stream_id {
            return Err(AppendError::StreamIdMismatch);
        }
    }

    let prev_chain_hash = events.last().map(|e| e.chain_hash.clone());

    // 1. payload hash
    let payload_hash = sha256_of_value(&draft.payload_hash_input())?;

    // 2. chain hash
    let chain_hash_input = serde_json::json!({
        "v": draft.v,
        "prevChainHash": prev_chain_hash,
        "payloadHash": payload_hash,
    });
    let chain_hash = sha256_of_value(&chain_hash_input)?;

    // 3. signature, if a signer was supplied
    let (signature, signer_key_id) = if let Some(signer) = signer {
        let raw_hash = hex_decode_32(&payload_hash);
        let context = serde_json::json!({
            "streamId": draft.stream_id.as_str(),
            "eventId": draft.id.as_str(),
        });
        let signed = signer
            .sign(&raw_hash, SigningPurpose::EventPayload, &context)
            .await?;
        (Some(signed.signature_base64), Some(signed.signer_key_id))
    } else {
        (None, None)
    };

    let finalized = ChainedEvent {
        v: draft.v,
        id: draft.id,
        stream_id: draft.stream_id,
        event_type: draft.event_type,
        at: draft.at,
        actor: draft.actor,
        payload: draft.payload,
        payload_hash,
        prev_chain_hash,
        chain_hash,
        signature,
        signer_key_id,
    };

    let mut extended = events.to_vec();
    extended.push(finalized);
    Ok(extended)
}

fn hex_decode_32(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap_or_default()
}

/// Recompute every hash (and, when present, signature) across `events` in
/// order, returning the first offending index on mismatch.
pub fn verify(
    events: &[ChainedEvent],
    public_key_by_key_id: &HashMap<String, PublicKey>,
) -> Result<(), ChainIntegrityError> {
    let mut prev_chain_hash: Option<String> = None;

    for (index, event) in events.iter().enumerate() {
        if event.prev_chain_hash != prev_chain_hash {
            return Err(ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::PrevChainHashMismatch,
            });
        }

        let expected_payload_hash = sha256_of_value(&event.payload_hash_input()).map_err(|_| {
            ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::PayloadHashMismatch,
            }
        })?;
        if expected_payload_hash != event.payload_hash {
            return Err(ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::PayloadHashMismatch,
            });
        }

        let expected_chain_hash = sha256_of_value(&event.chain_hash_input()).map_err(|_| {
            ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::ChainHashMismatch,
            }
        })?;
        if expected_chain_hash != event.chain_hash {
            return Err(ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::ChainHashMismatch,
            });
        }

        if let Some(signature) = &event.signature {
            let Some(signer_key_id) = &event.signer_key_id else {
                return Err(ChainIntegrityError {
                    index,
                    reason: ChainIntegrityReason::MissingSignerKeyId,
                });
            };
            let Some(public_key) = public_key_by_key_id.get(signer_key_id) else {
                return Err(ChainIntegrityError {
                    index,
                    reason: ChainIntegrityReason::UnknownSignerKeyId,
                });
            };
            let raw_hash = hex_decode_32(&event.payload_hash);
            let context = serde_json::json!({
                "streamId": event.stream_id.as_str(),
                "eventId": event.id.as_str(),
            });
            verify_envelope(
                &raw_hash,
                SigningPurpose::EventPayload,
                &context,
                signature,
                public_key,
            )
            .map_err(|_| ChainIntegrityError {
                index,
                reason: ChainIntegrityReason::SignatureInvalid,
            })?;
        }

        prev_chain_hash = Some(event.chain_hash.clone());
    }

    Ok(())
}

// `sha256_bytes` is re-exported for callers building payload-hash inputs
// without going through `create_event`/`append` (e.g. the store layer
// re-verifying on read).
pub use sha256_bytes as raw_sha256;

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_crypto::LocalSigner;

    fn draft(stream: &str, actor: &str, n: u32) -> CreateEventInput {
        CreateEventInput {
            stream_id: StreamId::new(stream),
            event_type: "test.event".into(),
            actor: actor.into(),
            payload: serde_json::json!({"n": n}),
            at: Some(format!("2026-01-01T00:00:0{}Z", n % 10)),
            id: Some(EventId::new(format!("evt_{n}"))),
        }
    }

    #[tokio::test]
    async fn unsigned_chain_verifies() {
        let mut events = Vec::new();
        for i in 0..3 {
            let d = create_event(draft("s1", "agent_a", i));
            events = append(&events, d, None).await.unwrap();
        }
        assert_eq!(events.len(), 3);
        assert!(events[0].prev_chain_hash.is_none());
        assert_eq!(events[1].prev_chain_hash, Some(events[0].chain_hash.clone()));
        verify(&events, &HashMap::new()).unwrap();
    }

    #[tokio::test]
    async fn signed_chain_verifies_with_key() {
        let signer = LocalSigner::generate("k1");
        let mut events = Vec::new();
        for i in 0..2 {
            let d = create_event(draft("s1", "agent_a", i));
            events = append(&events, d, Some(&signer)).await.unwrap();
        }
        let mut keys = HashMap::new();
        keys.insert("k1".to_string(), signer.public_key());
        verify(&events, &keys).unwrap();
    }

    #[tokio::test]
    async fn tampered_payload_fails_at_offending_index() {
        let mut events = Vec::new();
        for i in 0..3 {
            let d = create_event(draft("s1", "agent_a", i));
            events = append(&events, d, None).await.unwrap();
        }
        events[1].payload = serde_json::json!({"n": 999});
        let err = verify(&events, &HashMap::new()).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.reason, ChainIntegrityReason::PayloadHashMismatch);
    }

    #[tokio::test]
    async fn broken_prev_link_is_detected() {
        let mut events = Vec::new();
        for i in 0..3 {
            let d = create_event(draft("s1", "agent_a", i));
            events = append(&events, d, None).await.unwrap();
        }
        events[2].prev_chain_hash = Some("deadbeef".into());
        let err = verify(&events, &HashMap::new()).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.reason, ChainIntegrityReason::PrevChainHashMismatch);
    }

    #[tokio::test]
    async fn unknown_signer_key_id_is_detected() {
        let signer = LocalSigner::generate("k1");
        let d = create_event(draft("s1", "agent_a", 0));
        let events = append(&[], d, Some(&signer)).await.unwrap();
        let err = verify(&events, &HashMap::new()).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.reason, ChainIntegrityReason::UnknownSignerKeyId);
    }

    #[tokio::test]
    async fn append_rejects_cross_stream_draft() {
        let d1 = create_event(draft("s1", "agent_a", 0));
        let events = append(&[], d1, None).await.unwrap();
        let d2 = create_event(draft("s2", "agent_a", 1));
        let err = append(&events, d2, None).await.unwrap_err();
        assert!(matches!(err, AppendError::StreamIdMismatch));
    }
}
