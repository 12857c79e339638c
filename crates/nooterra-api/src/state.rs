//! Shared application state (spec §9 "global mutable state" note: every
//! dependency here is constructed explicitly at `create_router` and handed
//! down, never reached for through an ambient singleton).

use nooterra_crypto::Signer;
use nooterra_sse::{AgentCardBroadcaster, SessionBroadcaster};
use nooterra_store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub signer: Arc<dyn Signer>,
    pub session_broadcaster: Arc<SessionBroadcaster>,
    pub card_broadcaster: Arc<AgentCardBroadcaster>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, signer: Arc<dyn Signer>) -> Self {
        Self {
            store,
            signer,
            session_broadcaster: Arc::new(SessionBroadcaster::new()),
            card_broadcaster: Arc::new(AgentCardBroadcaster::new()),
        }
    }
}
