//! `StreamHead` - the snapshot projection kept consistent with each append
//! (spec §3).

use nooterra_types::StreamId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamHead {
    #[serde(rename = "streamId")]
    pub stream_id: StreamId,
    #[serde(rename = "lastEventId")]
    pub last_event_id: Option<String>,
    #[serde(rename = "lastChainHash")]
    pub last_chain_hash: Option<String>,
    #[serde(rename = "eventCount")]
    pub event_count: u64,
}

impl StreamHead {
    pub fn empty(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            last_event_id: None,
            last_chain_hash: None,
            event_count: 0,
        }
    }

    pub fn from_events(stream_id: StreamId, events: &[crate::event::ChainedEvent]) -> Self {
        match events.last() {
            Some(last) => Self {
                stream_id,
                last_event_id: Some(last.id.as_str().to_string()),
                last_chain_hash: Some(last.chain_hash.clone()),
                event_count: events.len() as u64,
            },
            None => Self::empty(stream_id),
        }
    }
}
