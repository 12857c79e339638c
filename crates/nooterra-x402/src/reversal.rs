//! Wind-down reversal dispatch (spec §4.5/§4.6): the outbox tick that
//! actually performs a gate's pending `GateReversal`.

use crate::error::{X402Error, X402Result};
use nooterra_store::{CommitTx, GateReversalDispatch, Op, ReversalAction, ReversalStatus, SettlementStatus, Store};
use nooterra_types::{DispatchId, GateId, TenantId};

pub struct ReversalDispatchResult {
    pub gate_id: GateId,
    pub dispatch_id: DispatchId,
    /// `"dispatch_already_completed"` on a dedup replay, the dispatched
    /// action name otherwise.
    pub outcome: String,
}

/// Dispatches one pending reversal. Already-completed dispatches (checked
/// via `GateReversalDispatch::status`) are skipped rather than repeated.
pub async fn dispatch_reversal(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    dispatch_id: &DispatchId,
    wind_down_id: &str,
    now: &str,
) -> X402Result<ReversalDispatchResult> {
    let mut gate = store
        .get_gate(tenant_id, gate_id)
        .await?
        .ok_or_else(|| X402Error::GateNotFound(gate_id.clone()))?;

    if let Some(existing) = &gate.reversal_dispatch {
        if existing.dispatch_id == *dispatch_id && existing.status == ReversalStatus::Completed {
            return Ok(ReversalDispatchResult {
                gate_id: gate_id.clone(),
                dispatch_id: dispatch_id.clone(),
                outcome: "dispatch_already_completed".to_string(),
            });
        }
    }

    let action = gate
        .reversal
        .as_ref()
        .map(|r| r.action)
        .unwrap_or(ReversalAction::VoidAuthorization);

    gate.reversal_dispatch = Some(GateReversalDispatch {
        dispatch_id: dispatch_id.clone(),
        status: ReversalStatus::Completed,
        wind_down_id: wind_down_id.to_string(),
    });
    if let Some(reversal) = gate.reversal.as_mut() {
        reversal.status = ReversalStatus::Completed;
    }
    gate.updated_at = now.to_string();
    gate.revision += 1;

    let mut ops = vec![Op::X402GatePut(gate.clone())];
    if let Some(settlement_id) = &gate.settlement_id {
        if let Some(mut settlement) = store.get_agent_run_settlement(tenant_id, settlement_id).await? {
            settlement.status = SettlementStatus::Refunded;
            settlement.revision += 1;
            ops.push(Op::AgentRunSettlementPut(settlement));
        }
    }

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops,
        })
        .await?;

    Ok(ReversalDispatchResult {
        gate_id: gate_id.clone(),
        dispatch_id: dispatch_id.clone(),
        outcome: action_name(action).to_string(),
    })
}

fn action_name(action: ReversalAction) -> &'static str {
    match action {
        ReversalAction::VoidAuthorization => "void_authorization",
        ReversalAction::RequestRefund => "request_refund",
        ReversalAction::ResolveRefund => "resolve_refund",
    }
}
