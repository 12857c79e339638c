//! Insolvency detection and the wind-down unwind sweep (spec §4.5).

use crate::error::X402Result;
use crate::gate;
use nooterra_store::{
    AgentLifecycleStatus, CommitTx, Op, Store, X402AgentLifecycle, X402Gate,
};
use nooterra_types::{AgentId, DispatchId, TenantId, WindDownId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsolvencyReason {
    /// `availableCents + escrowLockedCents == 0` while obligations remain
    /// outstanding. Wallet balances live outside this store's schema, so
    /// callers compute this from their ledger and pass the verdict in.
    FundsExhausted,
    /// The payer's `agentPassport.expiresAt` has passed `now`.
    DelegationExpired,
}

impl InsolvencyReason {
    pub fn reason_code(self) -> &'static str {
        match self {
            InsolvencyReason::FundsExhausted => "FUNDS_EXHAUSTED",
            InsolvencyReason::DelegationExpired => "DELEGATION_EXPIRED",
        }
    }
}

pub struct WindDownOutcome {
    pub wind_down_id: WindDownId,
    pub frozen_escalations: usize,
    pub cancelled_quotes: usize,
    pub reversal_dispatch_ids: Vec<DispatchId>,
}

/// Freezes the agent, auto-denies its pending escalations, cancels its
/// active quotes, and enqueues a deterministic reversal-request outbox
/// message per authorized-but-unverified gate.
pub async fn wind_down(
    store: &dyn Store,
    tenant_id: &TenantId,
    agent_id: &AgentId,
    reason: InsolvencyReason,
    now: &str,
) -> X402Result<WindDownOutcome> {
    let wind_down_id = WindDownId::new(format!("wd_{}", ulid::Ulid::new()));

    let lifecycle = X402AgentLifecycle {
        tenant_id: tenant_id.clone(),
        agent_id: agent_id.clone(),
        status: AgentLifecycleStatus::Frozen,
        reason_code: Some(reason.reason_code().to_string()),
        updated_at: now.to_string(),
        revision: 1,
    };
    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402AgentLifecyclePut(lifecycle)],
        })
        .await?;

    let mut frozen_escalations = 0;
    for escalation in store.list_pending_escalations_by_agent(tenant_id, agent_id).await? {
        let mut denied = escalation;
        denied.status = nooterra_store::EscalationStatus::Denied;
        denied.reason_code = Some("AGENT_INSOLVENT_AUTO_DENY".to_string());
        denied.updated_at = now.to_string();
        store
            .commit_tx(CommitTx {
                at: now.to_string(),
                ops: vec![Op::EscalationPut(denied)],
            })
            .await?;
        frozen_escalations += 1;
    }

    let mut cancelled_quotes = 0;
    for quoted_gate in store.list_active_quoted_gates(tenant_id, agent_id).await? {
        gate::cancel(store, tenant_id, &quoted_gate.gate_id, "X402_AGENT_FROZEN", now).await?;
        cancelled_quotes += 1;
    }

    let mut reversal_dispatch_ids = Vec::new();
    for unverified_gate in store.list_authorized_unverified_gates(tenant_id, agent_id).await? {
        let dispatch_id = reversal_dispatch_id(tenant_id, &unverified_gate, agent_id, &wind_down_id);
        enqueue_reversal_request(store, tenant_id, &unverified_gate, &dispatch_id, &wind_down_id, now).await?;
        reversal_dispatch_ids.push(dispatch_id);
    }

    Ok(WindDownOutcome {
        wind_down_id,
        frozen_escalations,
        cancelled_quotes,
        reversal_dispatch_ids,
    })
}

/// `dispatchId = SHA256(JCS({tenantId, gateId, agentId, windDownId}))`, so a
/// retried sweep over the same gate never double-enqueues.
fn reversal_dispatch_id(
    tenant_id: &TenantId,
    gate: &X402Gate,
    agent_id: &AgentId,
    wind_down_id: &WindDownId,
) -> DispatchId {
    let value = serde_json::json!({
        "tenantId": tenant_id.as_str(),
        "gateId": gate.gate_id.as_str(),
        "agentId": agent_id.as_str(),
        "windDownId": wind_down_id.as_str(),
    });
    let canonical = nooterra_crypto::canonicalize_value(&value).unwrap_or_default();
    let hash = nooterra_crypto::sha256_bytes(canonical.as_bytes());
    DispatchId::new(hex::encode(hash))
}

async fn enqueue_reversal_request(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate: &X402Gate,
    dispatch_id: &DispatchId,
    wind_down_id: &WindDownId,
    now: &str,
) -> X402Result<()> {
    if store.find_outbox_by_dispatch_id(tenant_id, dispatch_id).await?.is_some() {
        return Ok(());
    }

    let message = nooterra_store::OutboxMessage {
        tenant_id: tenant_id.clone(),
        id: nooterra_types::OutboxMessageId::new(format!("obx_{}", ulid::Ulid::new())),
        message_type: "X402_AGENT_WINDDOWN_REVERSAL_REQUESTED".to_string(),
        at: now.to_string(),
        payload: serde_json::json!({
            "gateId": gate.gate_id.as_str(),
            "payerAgentId": gate.payer_agent_id.as_str(),
            "windDownId": wind_down_id.as_str(),
        }),
        attempts: 0,
        next_attempt_at: now.to_string(),
        delivered_at: None,
        dead: false,
        dispatch_id: Some(dispatch_id.clone()),
    };
    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::OutboxEnqueue(message)],
        })
        .await?;
    Ok(())
}
