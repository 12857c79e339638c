//! x402 payment gate endpoints (spec §4.5, §6).

use crate::error::ApiError;
use crate::extract::{self, tenant_id};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use nooterra_types::{
    Cents, Currency, EscalationId, ErrorCode, GateId, QuoteId, SettlementId, SponsorWalletRef, ToolId,
};
use nooterra_x402::{
    gate, insolvency, AuthorizeInput, AuthorizeOutcome, CreateGateInput, ProofPolicy, QuoteInput,
    VerificationOutcome, VerifyInput,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGateRequest {
    pub gate_id: String,
    pub payer_agent_id: String,
    pub payee_agent_id: String,
    pub amount_cents: Cents,
    pub currency: Currency,
    pub tool_id: Option<String>,
    pub agent_passport_expires_at: Option<String>,
    pub settlement_id: Option<String>,
}

pub async fn create_gate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateGateRequest>,
) -> Result<Json<nooterra_store::X402Gate>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let now = extract::now_rfc3339();
    let gate = gate::create(
        state.store.as_ref(),
        CreateGateInput {
            tenant_id: tenant,
            gate_id: GateId::new(body.gate_id),
            payer_agent_id: nooterra_types::AgentId::new(body.payer_agent_id),
            payee_agent_id: nooterra_types::AgentId::new(body.payee_agent_id),
            amount_cents: body.amount_cents,
            currency: body.currency,
            tool_id: body.tool_id.map(ToolId::new),
            agent_passport_expires_at: body.agent_passport_expires_at,
            settlement_id: body.settlement_id.map(SettlementId::new),
        },
        &now,
    )
    .await?;
    Ok(Json(gate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteGateRequest {
    pub gate_id: String,
    pub quote_id: String,
    pub expires_at: String,
}

pub async fn quote_gate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QuoteGateRequest>,
) -> Result<Json<nooterra_store::X402Gate>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let now = extract::now_rfc3339();
    let gate = gate::quote(
        state.store.as_ref(),
        &tenant,
        &GateId::new(body.gate_id),
        QuoteInput {
            quote_id: QuoteId::new(body.quote_id),
            expires_at: body.expires_at,
        },
        &now,
    )
    .await?;
    Ok(Json(gate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeWalletRequest {
    pub gate_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum AuthorizeWalletResponse {
    Authorized {
        gate: Box<nooterra_store::X402Gate>,
        decision_token: Box<nooterra_store::WalletAuthorizationDecisionToken>,
    },
    Escalated {
        escalation_id: String,
    },
}

pub async fn authorize_wallet(
    State(state): State<Arc<AppState>>,
    Path(wallet_ref): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AuthorizeWalletRequest>,
) -> Result<Json<AuthorizeWalletResponse>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let idempotency_key = extract::idempotency_key(&headers)
        .ok_or_else(|| ApiError::new(ErrorCode::IdempotencyKeyRequired, "X-Idempotency-Key is required"))?;
    let now = extract::now_rfc3339();

    let outcome = gate::authorize(
        state.store.as_ref(),
        &tenant,
        &GateId::new(body.gate_id),
        AuthorizeInput {
            sponsor_wallet_ref: SponsorWalletRef::new(wallet_ref),
            idempotency_key,
        },
        state.signer.as_ref(),
        &now,
    )
    .await?;

    match outcome {
        AuthorizeOutcome::Authorized { gate, decision_token } => Ok(Json(AuthorizeWalletResponse::Authorized {
            gate: Box::new(gate),
            decision_token: Box::new(decision_token),
        })),
        AuthorizeOutcome::Escalated { escalation_id, .. } => Ok(Json(AuthorizeWalletResponse::Escalated {
            escalation_id: escalation_id.as_str().to_string(),
        })),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizePaymentRequest {
    pub gate_id: String,
    pub decision_token: String,
}

pub async fn authorize_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AuthorizePaymentRequest>,
) -> Result<Json<nooterra_store::X402Gate>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let gate = gate::authorize_payment(
        state.store.as_ref(),
        &tenant,
        &GateId::new(body.gate_id),
        &body.decision_token,
    )
    .await?;
    Ok(Json(gate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyGateRequest {
    pub gate_id: String,
    #[serde(default)]
    pub verification_codes: Vec<String>,
    pub proof_policy: ProofPolicyWire,
    pub outcome: VerificationOutcomeWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofPolicyWire {
    Strict,
    Holdback,
    Lenient,
}

impl From<ProofPolicyWire> for ProofPolicy {
    fn from(w: ProofPolicyWire) -> Self {
        match w {
            ProofPolicyWire::Strict => ProofPolicy::Strict,
            ProofPolicyWire::Holdback => ProofPolicy::Holdback,
            ProofPolicyWire::Lenient => ProofPolicy::Lenient,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcomeWire {
    Pass,
    Fail,
}

impl From<VerificationOutcomeWire> for VerificationOutcome {
    fn from(w: VerificationOutcomeWire) -> Self {
        match w {
            VerificationOutcomeWire::Pass => VerificationOutcome::Pass,
            VerificationOutcomeWire::Fail => VerificationOutcome::Fail,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyGateResponse {
    pub gate: nooterra_store::X402Gate,
    pub reason_codes: Vec<String>,
    pub revenue_recognized: bool,
}

pub async fn verify_gate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyGateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = tenant_id(&headers)?;
    let now = extract::now_rfc3339();
    let result = gate::verify(
        state.store.as_ref(),
        &tenant,
        &GateId::new(body.gate_id),
        VerifyInput {
            verification_codes: body.verification_codes,
            proof_policy: body.proof_policy.into(),
            outcome: body.outcome.into(),
        },
        state.signer.as_ref(),
        &now,
    )
    .await?;

    let mut response_headers = HeaderMap::new();
    if let Some(first) = result.reason_codes.first() {
        if let Ok(value) = HeaderValue::from_str(first) {
            response_headers.insert("X-Settld-Reason-Code", value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&result.reason_codes.join(",")) {
        response_headers.insert("X-Settld-Verification-Codes", value);
    }

    Ok((
        response_headers,
        Json(VerifyGateResponse {
            gate: result.gate,
            reason_codes: result.reason_codes,
            revenue_recognized: result.revenue_recognized,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindDownResponse {
    pub wind_down_id: String,
    pub frozen_escalations: usize,
    pub cancelled_quotes: usize,
    pub reversal_dispatch_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindDownRequest {
    #[serde(default)]
    pub reason: WindDownReasonWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindDownReasonWire {
    FundsExhausted,
    #[default]
    DelegationExpired,
}

pub async fn wind_down_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<WindDownRequest>,
) -> Result<Json<WindDownResponse>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let now = extract::now_rfc3339();
    let reason = match body.reason {
        WindDownReasonWire::FundsExhausted => insolvency::InsolvencyReason::FundsExhausted,
        WindDownReasonWire::DelegationExpired => insolvency::InsolvencyReason::DelegationExpired,
    };

    let outcome = insolvency::wind_down(
        state.store.as_ref(),
        &tenant,
        &nooterra_types::AgentId::new(agent_id),
        reason,
        &now,
    )
    .await?;

    Ok(Json(WindDownResponse {
        wind_down_id: outcome.wind_down_id.as_str().to_string(),
        frozen_escalations: outcome.frozen_escalations,
        cancelled_quotes: outcome.cancelled_quotes,
        reversal_dispatch_ids: outcome
            .reversal_dispatch_ids
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect(),
    }))
}

pub async fn get_escalation(
    State(state): State<Arc<AppState>>,
    Path(escalation_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<nooterra_store::Escalation>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let escalation = state
        .store
        .get_escalation(&tenant, &EscalationId::new(escalation_id))
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::SchemaInvalid, "escalation not found"))?;
    Ok(Json(escalation))
}