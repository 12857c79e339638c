//! The autotick scheduler's three jobs (spec §4.6): `tickDeliveries`,
//! `tickX402InsolvencySweep`, `tickX402WinddownReversals`.

use crate::delivery::{deliver_one, DeliveryOutcome, WebhookTarget};
use crate::error::OutboxResult;
use nooterra_store::Store;
use nooterra_types::TenantId;
use nooterra_x402::{insolvency, reversal, InsolvencyReason};

const WINDDOWN_REVERSAL_MESSAGE_TYPE: &str = "X402_AGENT_WINDDOWN_REVERSAL_REQUESTED";

/// Delivers every due outbox message across all tenants. `resolve_target`
/// maps a tenant to its configured webhook endpoint/secret; tenants with no
/// target configured are skipped for this tick.
pub async fn tick_deliveries<'a, F>(
    store: &dyn Store,
    client: &reqwest::Client,
    now: &str,
    limit: usize,
    resolve_target: F,
) -> OutboxResult<Vec<DeliveryOutcome>>
where
    F: Fn(&TenantId) -> Option<WebhookTarget<'a>>,
{
    let mut outcomes = Vec::new();
    let due = store.list_due_outbox_messages(None, now, None, limit).await?;
    for message in due {
        let Some(target) = resolve_target(&message.tenant_id) else {
            continue;
        };
        let outcome = deliver_one(client, store, target, message, now).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

pub struct InsolvencySweepOutcome {
    pub tenant_id: TenantId,
    pub agent_id: String,
    pub wind_down_id: String,
}

/// Freezes every agent whose delegation passport has expired (the only
/// insolvency criterion this control plane can detect from its own store;
/// fund-exhaustion requires wallet balance data owned by an external
/// ledger and is evaluated by the caller before this tick runs).
pub async fn tick_x402_insolvency_sweep(
    store: &dyn Store,
    now: &str,
) -> OutboxResult<Vec<InsolvencySweepOutcome>> {
    let mut outcomes = Vec::new();
    for gate in store.list_gates_with_expired_passport(now).await? {
        let outcome = insolvency::wind_down(
            store,
            &gate.tenant_id,
            &gate.payer_agent_id,
            InsolvencyReason::DelegationExpired,
            now,
        )
        .await?;
        outcomes.push(InsolvencySweepOutcome {
            tenant_id: gate.tenant_id,
            agent_id: gate.payer_agent_id.as_str().to_string(),
            wind_down_id: outcome.wind_down_id.as_str().to_string(),
        });
    }
    Ok(outcomes)
}

/// Dispatches every due wind-down reversal outbox message (enqueued by
/// [`insolvency::wind_down`]) against its gate.
pub async fn tick_x402_winddown_reversals(
    store: &dyn Store,
    now: &str,
    limit: usize,
) -> OutboxResult<Vec<reversal::ReversalDispatchResult>> {
    let mut outcomes = Vec::new();
    let due = store
        .list_due_outbox_messages(None, now, Some(WINDDOWN_REVERSAL_MESSAGE_TYPE), limit)
        .await?;
    for message in due {
        let Some(gate_id) = message.payload.get("gateId").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(wind_down_id) = message.payload.get("windDownId").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(dispatch_id) = &message.dispatch_id else {
            continue;
        };

        let result = reversal::dispatch_reversal(
            store,
            &message.tenant_id,
            &nooterra_types::GateId::new(gate_id),
            dispatch_id,
            wind_down_id,
            now,
        )
        .await?;

        store
            .commit_tx(nooterra_store::CommitTx {
                at: now.to_string(),
                ops: vec![nooterra_store::Op::OutboxMarkDelivered {
                    tenant_id: message.tenant_id,
                    id: message.id,
                    delivered_at: now.to_string(),
                }],
            })
            .await?;

        outcomes.push(result);
    }
    Ok(outcomes)
}
