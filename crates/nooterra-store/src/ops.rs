//! The heterogeneous operation batch `commitTx` applies atomically (spec §4.3).

use crate::entities::*;
use nooterra_chain::ChainedEvent;
use nooterra_types::{
    AgentId, Cents, DispatchId, OutboxMessageId, SessionId, SponsorWalletRef, StreamId, TenantId,
};
use serde::{Deserialize, Serialize};

/// A single typed mutation. `Store::commit_tx` applies a `Vec<Op>` as one
/// all-or-nothing batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Op {
    SessionCreate(Session),
    SessionAppendEvent {
        tenant_id: TenantId,
        session_id: SessionId,
        stream_id: StreamId,
        event: ChainedEvent,
    },
    AgentCardUpsert(AgentCard),
    AgentCardRemove {
        tenant_id: TenantId,
        agent_id: AgentId,
        reason_code: String,
    },
    X402GatePut(X402Gate),
    X402WalletPolicyPut(X402WalletPolicy),
    X402AgentLifecyclePut(X402AgentLifecycle),
    EscalationPut(Escalation),
    OutboxEnqueue(OutboxMessage),
    OutboxMarkDelivered {
        tenant_id: TenantId,
        id: OutboxMessageId,
        delivered_at: String,
    },
    OutboxMarkAttemptFailed {
        tenant_id: TenantId,
        id: OutboxMessageId,
        next_attempt_at: String,
        attempts: u32,
    },
    OutboxMarkDead {
        tenant_id: TenantId,
        id: OutboxMessageId,
    },
    IdempotencyPut(IdempotencyRecord),
    AgentRunSettlementPut(AgentRunSettlement),
    /// Adds to the running total counted against a wallet's
    /// `maxDailyAuthorizationCents` (spec §4.4). `day` is a `YYYY-MM-DD` key.
    X402RecordDailyAuthorization {
        sponsor_wallet_ref: SponsorWalletRef,
        day: String,
        amount_cents: Cents,
    },
}

/// A batch of ops plus the commit timestamp they are attributed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTx {
    pub at: String,
    pub ops: Vec<Op>,
}

/// Marker type used only to make dedup-by-dispatch-id explicit at call
/// sites; not persisted itself (the dispatch id lives on the outbox
/// message / gate reversal dispatch record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchKey<'a> {
    pub tenant_id: &'a str,
    pub gate_id: &'a str,
    pub dispatch_id: &'a DispatchId,
}
