//! The x402 gate state machine (spec §4.5): `create`, `quote`, `authorize`,
//! `authorize-payment`, `verify`, `cancel`, `freeze`, `reverse`.

use crate::error::{X402Error, X402Result};
use crate::wallet_policy::{evaluate_authorization, AuthorizationRequest, PolicyVerdict};
use nooterra_crypto::{sha256_of_value, Signer, SigningPurpose};
use nooterra_store::{
    AgentLifecycleStatus, AgentPassport, CommitTx, Escalation, EscalationStatus, GateAuthorization,
    GateQuote, GateReversal, GateState, Op, PolicyDecision, ReversalAction, ReversalStatus, Store,
    X402Gate,
};
use nooterra_types::{
    AgentId, Cents, Currency, EscalationId, GateId, QuoteId, SettlementId, SponsorWalletRef,
    TenantId, ToolId,
};

fn state_name(state: GateState) -> &'static str {
    match state {
        GateState::Created => "created",
        GateState::Quoted => "quoted",
        GateState::Authorized => "authorized",
        GateState::Verified => "verified",
        GateState::Settled => "settled",
        GateState::Cancelled => "cancelled",
        GateState::Blocked => "blocked",
        GateState::Voided => "voided",
    }
}

fn require_state(gate: &X402Gate, expected: GateState) -> X402Result<()> {
    if gate.state != expected {
        return Err(X402Error::InvalidState {
            gate_id: gate.gate_id.clone(),
            expected: state_name(expected),
            found: state_name(gate.state),
        });
    }
    Ok(())
}

async fn load_gate(store: &dyn Store, tenant_id: &TenantId, gate_id: &GateId) -> X402Result<X402Gate> {
    store
        .get_gate(tenant_id, gate_id)
        .await?
        .ok_or_else(|| X402Error::GateNotFound(gate_id.clone()))
}

async fn require_not_frozen(store: &dyn Store, tenant_id: &TenantId, agent_id: &AgentId) -> X402Result<()> {
    if let Some(lifecycle) = store.get_agent_lifecycle(tenant_id, agent_id).await? {
        if lifecycle.status == AgentLifecycleStatus::Frozen {
            return Err(X402Error::AgentFrozen);
        }
    }
    Ok(())
}

pub struct CreateGateInput {
    pub tenant_id: TenantId,
    pub gate_id: GateId,
    pub payer_agent_id: AgentId,
    pub payee_agent_id: AgentId,
    pub amount_cents: Cents,
    pub currency: Currency,
    pub tool_id: Option<ToolId>,
    pub agent_passport_expires_at: Option<String>,
    pub settlement_id: Option<SettlementId>,
}

/// Rejects a frozen payer outright (`X402_AGENT_FROZEN`, 410) rather than
/// letting the gate sit in `created` state.
pub async fn create(store: &dyn Store, input: CreateGateInput, now: &str) -> X402Result<X402Gate> {
    require_not_frozen(store, &input.tenant_id, &input.payer_agent_id).await?;

    let gate = X402Gate {
        tenant_id: input.tenant_id,
        gate_id: input.gate_id,
        payer_agent_id: input.payer_agent_id,
        payee_agent_id: input.payee_agent_id,
        amount_cents: input.amount_cents,
        currency: input.currency,
        tool_id: input.tool_id,
        state: GateState::Created,
        agent_passport: input
            .agent_passport_expires_at
            .map(|expires_at| AgentPassport { expires_at }),
        quote: None,
        authorization: None,
        reversal: None,
        reversal_dispatch: None,
        quote_cancel_reason_code: None,
        quote_canceled_at: None,
        policy_decision: None,
        settlement_id: input.settlement_id,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        revision: 1,
    };
    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;
    Ok(gate)
}

pub struct QuoteInput {
    pub quote_id: QuoteId,
    pub expires_at: String,
}

/// Idempotent by `quoteId`: replaying the same quote on an already-quoted
/// gate returns the existing gate unchanged instead of erroring.
pub async fn quote(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    input: QuoteInput,
    now: &str,
) -> X402Result<X402Gate> {
    let mut gate = load_gate(store, tenant_id, gate_id).await?;
    if let Some(existing) = &gate.quote {
        if existing.quote_id == input.quote_id {
            return Ok(gate);
        }
    }
    require_state(&gate, GateState::Created)?;

    gate.quote = Some(GateQuote {
        quote_id: input.quote_id,
        expires_at: input.expires_at,
        amount_cents: gate.amount_cents,
        currency: gate.currency.clone(),
    });
    gate.state = GateState::Quoted;
    gate.updated_at = now.to_string();
    gate.revision += 1;

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;
    Ok(gate)
}

pub struct AuthorizeInput {
    pub sponsor_wallet_ref: SponsorWalletRef,
    pub idempotency_key: String,
}

pub enum AuthorizeOutcome {
    Authorized {
        gate: X402Gate,
        decision_token: nooterra_store::WalletAuthorizationDecisionToken,
    },
    /// A policy violation paused the decision; the caller surfaces
    /// `X402_AUTHORIZATION_ESCALATION_REQUIRED` (409) with this id.
    Escalated {
        gate: X402Gate,
        escalation_id: EscalationId,
    },
}

/// Evaluates the sponsor wallet policy and either authorizes the gate or
/// records an escalation (spec §4.5 `authorize`).
pub async fn authorize(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    input: AuthorizeInput,
    signer: &dyn Signer,
    now: &str,
) -> X402Result<AuthorizeOutcome> {
    let gate = load_gate(store, tenant_id, gate_id).await?;
    require_not_frozen(store, tenant_id, &gate.payer_agent_id).await?;

    if gate.state != GateState::Created && gate.state != GateState::Quoted {
        return Err(X402Error::InvalidState {
            gate_id: gate_id.clone(),
            expected: "created or quoted",
            found: state_name(gate.state),
        });
    }

    let policy = store
        .get_wallet_policy(&input.sponsor_wallet_ref)
        .await?
        .ok_or(X402Error::WalletPolicyNotFound)?;
    if policy.status == nooterra_store::WalletPolicyStatus::Suspended {
        return Err(X402Error::WalletPolicySuspended);
    }

    let day = now.get(..10).unwrap_or(now).to_string();
    let todays_authorizations = store
        .sum_todays_authorizations(&input.sponsor_wallet_ref, &day)
        .await?;

    let request = AuthorizationRequest {
        sponsor_wallet_ref_token: input.sponsor_wallet_ref.as_str(),
        gate_id: gate_id.clone(),
        quote_id: gate.quote.as_ref().map(|q| q.quote_id.clone()),
        idempotency_key: &input.idempotency_key,
        amount_cents: gate.amount_cents,
        currency: &gate.currency,
        payee_agent_id: &gate.payee_agent_id,
        tool_id: gate.tool_id.as_ref(),
        todays_authorizations,
    };

    match evaluate_authorization(&policy, &request) {
        PolicyVerdict::Allow(mut token) => {
            let decision_context = serde_json::json!({
                "sponsorWalletRef": token.sponsor_wallet_ref.as_str(),
                "gateId": token.gate_id.as_str(),
                "quoteId": token.quote_id.as_ref().map(|q| q.as_str()),
                "idempotencyKey": token.idempotency_key,
            });
            let payload_hash = sha256_of_value(&serde_json::json!({ "token": token.token }))
                .map_err(|e| X402Error::Signing(e.to_string()))?;
            let raw_hash = hex::decode(&payload_hash).map_err(|e| X402Error::Signing(e.to_string()))?;
            let signed = signer
                .sign(&raw_hash, SigningPurpose::SettlementDecisionReport, &decision_context)
                .await
                .map_err(|e| X402Error::Signing(e.to_string()))?;
            token.signature = signed.signature_base64;
            token.signer_key_id = signed.signer_key_id;

            let mut gate = gate;
            gate.authorization = Some(GateAuthorization {
                decision_token: token.token.clone(),
                sponsor_wallet_ref: input.sponsor_wallet_ref.clone(),
                authorized_at: now.to_string(),
            });
            gate.state = GateState::Authorized;
            gate.updated_at = now.to_string();
            gate.revision += 1;

            store
                .commit_tx(CommitTx {
                    at: now.to_string(),
                    ops: vec![
                        Op::X402GatePut(gate.clone()),
                        Op::X402RecordDailyAuthorization {
                            sponsor_wallet_ref: input.sponsor_wallet_ref,
                            day,
                            amount_cents: gate.amount_cents,
                        },
                    ],
                })
                .await?;
            Ok(AuthorizeOutcome::Authorized {
                gate,
                decision_token: token,
            })
        }
        PolicyVerdict::Escalate(reason_code) => {
            let escalation = Escalation {
                tenant_id: tenant_id.clone(),
                escalation_id: EscalationId::new(format!("esc_{}", ulid::Ulid::new())),
                gate_id: gate_id.clone(),
                agent_id: gate.payer_agent_id.clone(),
                status: EscalationStatus::Pending,
                reason_code: Some(reason_code.to_string()),
                created_at: now.to_string(),
                updated_at: now.to_string(),
            };
            store
                .commit_tx(CommitTx {
                    at: now.to_string(),
                    ops: vec![Op::EscalationPut(escalation.clone())],
                })
                .await?;
            Ok(AuthorizeOutcome::Escalated {
                gate,
                escalation_id: escalation.escalation_id,
            })
        }
    }
}

/// Consumes a wallet decision token. Idempotent by `gateId`: a replay
/// carrying the token already recorded on the gate is a no-op success.
pub async fn authorize_payment(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    decision_token: &str,
) -> X402Result<X402Gate> {
    let gate = load_gate(store, tenant_id, gate_id).await?;
    match &gate.authorization {
        Some(auth) if auth.decision_token == decision_token => Ok(gate),
        Some(_) => Err(X402Error::InvalidState {
            gate_id: gate_id.clone(),
            expected: "matching decision token",
            found: "stale decision token",
        }),
        None => Err(X402Error::InvalidState {
            gate_id: gate_id.clone(),
            expected: "authorized",
            found: state_name(gate.state),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofPolicy {
    Strict,
    Holdback,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Pass,
    Fail,
}

pub struct VerifyInput {
    pub verification_codes: Vec<String>,
    pub proof_policy: ProofPolicy,
    pub outcome: VerificationOutcome,
}

pub struct VerifyResult {
    pub gate: X402Gate,
    pub reason_codes: Vec<String>,
    /// Per §9's no-charge settlement journal rule: a `strict`/`holdback`
    /// policy FAIL always closes the job with escrow and coverage returned
    /// and no revenue recognized, regardless of any other signal.
    pub revenue_recognized: bool,
}

/// Transitions `authorized` to `verified` or `settled` (spec §4.5 `verify`),
/// applying reason-code normalization, the no-charge settlement rule, and
/// producing a signed `PolicyDecision.v1` record bound to the outcome.
///
/// A gate settles immediately (rather than landing in `verified`, pending a
/// later settlement step) when there is nothing left to reconcile: a
/// zero-amount charge has no funds movement to settle later.
pub async fn verify(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    input: VerifyInput,
    signer: &dyn Signer,
    now: &str,
) -> X402Result<VerifyResult> {
    let mut gate = load_gate(store, tenant_id, gate_id).await?;
    require_state(&gate, GateState::Authorized)?;

    let reason_codes = nooterra_types::reason_code::normalize_reason_codes(&input.verification_codes);
    let no_charge = matches!(input.proof_policy, ProofPolicy::Strict | ProofPolicy::Holdback)
        && input.outcome == VerificationOutcome::Fail;

    gate.state = if gate.amount_cents.0 == 0 {
        GateState::Settled
    } else {
        GateState::Verified
    };
    gate.updated_at = now.to_string();
    gate.revision += 1;

    let decision_payload = serde_json::json!({
        "schemaVersion": 1,
        "gateId": gate.gate_id.as_str(),
        "outcome": state_name(gate.state),
        "reasonCodes": reason_codes,
        "decidedAt": now,
    });
    let payload_hash = sha256_of_value(&decision_payload).map_err(|e| X402Error::Signing(e.to_string()))?;
    let raw_hash = hex::decode(&payload_hash).map_err(|e| X402Error::Signing(e.to_string()))?;
    let signed = signer
        .sign(
            &raw_hash,
            SigningPurpose::SettlementDecisionReport,
            &serde_json::json!({ "gateId": gate.gate_id.as_str() }),
        )
        .await
        .map_err(|e| X402Error::Signing(e.to_string()))?;

    gate.policy_decision = Some(PolicyDecision {
        schema_version: 1,
        gate_id: gate.gate_id.clone(),
        outcome: gate.state,
        reason_codes: reason_codes.clone(),
        decided_at: now.to_string(),
        signature: signed.signature_base64,
        signer_key_id: signed.signer_key_id,
    });

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;

    Ok(VerifyResult {
        gate,
        reason_codes,
        revenue_recognized: !no_charge,
    })
}

/// Cancels a gate that has not yet been authorized.
pub async fn cancel(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    reason_code: &str,
    now: &str,
) -> X402Result<X402Gate> {
    let mut gate = load_gate(store, tenant_id, gate_id).await?;
    if !matches!(gate.state, GateState::Created | GateState::Quoted) {
        return Err(X402Error::InvalidState {
            gate_id: gate_id.clone(),
            expected: "created or quoted",
            found: state_name(gate.state),
        });
    }

    gate.state = GateState::Cancelled;
    gate.quote_cancel_reason_code = Some(reason_code.to_string());
    gate.quote_canceled_at = Some(now.to_string());
    if let Some(quote) = gate.quote.as_mut() {
        if quote.expires_at > now {
            quote.expires_at = now.to_string();
        }
    }
    gate.updated_at = now.to_string();
    gate.revision += 1;

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;
    Ok(gate)
}

/// Forces a gate into `blocked`, used by the insolvency/wind-down sweep to
/// halt an authorized-but-unverified gate (spec §4.5).
pub async fn freeze(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    reason_code: &str,
    now: &str,
) -> X402Result<X402Gate> {
    let mut gate = load_gate(store, tenant_id, gate_id).await?;
    gate.state = GateState::Blocked;
    gate.quote_cancel_reason_code = Some(reason_code.to_string());
    gate.updated_at = now.to_string();
    gate.revision += 1;

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;
    Ok(gate)
}

/// Requests a reversal on a verified/settled gate, recording it `pending`
/// until the outbox dispatch tick completes it (spec §4.5, §4.6).
pub async fn reverse(
    store: &dyn Store,
    tenant_id: &TenantId,
    gate_id: &GateId,
    action: ReversalAction,
    now: &str,
) -> X402Result<X402Gate> {
    let mut gate = load_gate(store, tenant_id, gate_id).await?;
    if !matches!(gate.state, GateState::Verified | GateState::Settled | GateState::Authorized) {
        return Err(X402Error::InvalidState {
            gate_id: gate_id.clone(),
            expected: "authorized, verified or settled",
            found: state_name(gate.state),
        });
    }

    gate.reversal = Some(GateReversal {
        action,
        status: ReversalStatus::Pending,
        requested_at: now.to_string(),
    });
    gate.state = GateState::Voided;
    gate.updated_at = now.to_string();
    gate.revision += 1;

    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::X402GatePut(gate.clone())],
        })
        .await?;
    Ok(gate)
}
