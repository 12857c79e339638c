//! Chained event types (spec §3 `ChainedEvent`, §4.2).

use nooterra_types::{EventId, StreamId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unhashed, unsigned event under construction. Returned by
/// `create_event`; finalized into a [`ChainedEvent`] by `append`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEvent {
    pub v: u32,
    pub id: EventId,
    #[serde(rename = "streamId")]
    pub stream_id: StreamId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub at: String,
    pub actor: String,
    pub payload: Value,
}

/// A finalized, chained event as it is stored and replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedEvent {
    pub v: u32,
    pub id: EventId,
    #[serde(rename = "streamId")]
    pub stream_id: StreamId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub at: String,
    pub actor: String,
    pub payload: Value,
    #[serde(rename = "payloadHash")]
    pub payload_hash: String,
    #[serde(rename = "prevChainHash")]
    pub prev_chain_hash: Option<String>,
    #[serde(rename = "chainHash")]
    pub chain_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "signerKeyId", skip_serializing_if = "Option::is_none")]
    pub signer_key_id: Option<String>,
}

impl ChainedEvent {
    /// The `{v,id,at,streamId,type,actor,payload}` object whose canonical
    /// hash is `payloadHash`.
    pub fn payload_hash_input(&self) -> Value {
        serde_json::json!({
            "v": self.v,
            "id": self.id.as_str(),
            "at": self.at,
            "streamId": self.stream_id.as_str(),
            "type": self.event_type,
            "actor": self.actor,
            "payload": self.payload,
        })
    }

    /// The `{v,prevChainHash,payloadHash}` object whose canonical hash is
    /// `chainHash`.
    pub fn chain_hash_input(&self) -> Value {
        serde_json::json!({
            "v": self.v,
            "prevChainHash": self.prev_chain_hash,
            "payloadHash": self.payload_hash,
        })
    }
}

impl DraftEvent {
    pub fn payload_hash_input(&self) -> Value {
        serde_json::json!({
            "v": self.v,
            "id": self.id.as_str(),
            "at": self.at,
            "streamId": self.stream_id.as_str(),
            "type": self.event_type,
            "actor": self.actor,
            "payload": self.payload,
        })
    }
}
