//! Tenant-scoped entities owned exclusively by the store (spec §3).

use nooterra_types::{
    AgentId, Cents, Currency, DispatchId, EscalationId, GateId, OutboxMessageId, PolicyRef,
    QuoteId, RunId, SessionId, SettlementId, SponsorRef, SponsorWalletRef, StreamId, TenantId,
    ToolId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Tenant,
    Private,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub visibility: Visibility,
    pub participants: BTreeSet<AgentId>,
    pub created_at: String,
    pub updated_at: String,
    pub last_event_id: Option<String>,
    pub last_chain_hash: Option<String>,
    pub revision: u64,
}

impl Session {
    pub fn stream_id(&self) -> StreamId {
        StreamId::new(format!("session:{}", self.session_id.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub visibility: Visibility,
    pub capabilities: Vec<String>,
    pub host: String,
    pub tools: Vec<String>,
    pub updated_at: String,
    pub revision: u64,
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Created,
    Quoted,
    Authorized,
    Verified,
    Settled,
    Cancelled,
    Blocked,
    Voided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateQuote {
    pub quote_id: QuoteId,
    pub expires_at: String,
    pub amount_cents: Cents,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAuthorizationDecisionToken {
    pub token: String,
    pub sponsor_wallet_ref: SponsorWalletRef,
    pub gate_id: GateId,
    pub quote_id: Option<QuoteId>,
    pub idempotency_key: String,
    pub signature: String,
    pub signer_key_id: String,
}

/// `PolicyDecision.v1` - the signed record `verify` produces, binding the
/// gate's verification outcome and normalized reason codes to a signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub schema_version: u32,
    pub gate_id: GateId,
    pub outcome: GateState,
    pub reason_codes: Vec<String>,
    pub decided_at: String,
    pub signature: String,
    pub signer_key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateAuthorization {
    pub decision_token: String,
    pub sponsor_wallet_ref: SponsorWalletRef,
    pub authorized_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalAction {
    VoidAuthorization,
    RequestRefund,
    ResolveRefund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReversal {
    pub action: ReversalAction,
    pub status: ReversalStatus,
    pub requested_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReversalDispatch {
    pub dispatch_id: DispatchId,
    pub status: ReversalStatus,
    pub wind_down_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPassport {
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X402Gate {
    pub tenant_id: TenantId,
    pub gate_id: GateId,
    pub payer_agent_id: AgentId,
    pub payee_agent_id: AgentId,
    pub amount_cents: Cents,
    pub currency: Currency,
    pub tool_id: Option<ToolId>,
    pub state: GateState,
    pub agent_passport: Option<AgentPassport>,
    pub quote: Option<GateQuote>,
    pub authorization: Option<GateAuthorization>,
    pub reversal: Option<GateReversal>,
    pub reversal_dispatch: Option<GateReversalDispatch>,
    pub quote_cancel_reason_code: Option<String>,
    pub quote_canceled_at: Option<String>,
    pub policy_decision: Option<PolicyDecision>,
    /// The escrow settlement this gate's charge covers, if any. Wind-down
    /// reversal dispatch bumps it to `refunded`.
    pub settlement_id: Option<SettlementId>,
    pub created_at: String,
    pub updated_at: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletPolicyStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X402WalletPolicy {
    pub sponsor_ref: SponsorRef,
    pub sponsor_wallet_ref: SponsorWalletRef,
    pub policy_ref: PolicyRef,
    pub policy_version: u32,
    pub status: WalletPolicyStatus,
    pub max_amount_cents: Cents,
    pub max_daily_authorization_cents: Cents,
    pub allowed_provider_ids: BTreeSet<AgentId>,
    pub allowed_tool_ids: BTreeSet<ToolId>,
    pub allowed_currencies: BTreeSet<Currency>,
    pub allowed_reversal_actions: BTreeSet<ReversalAction>,
    pub require_quote: bool,
    pub require_strict_request_binding: bool,
    pub require_agent_key_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycleStatus {
    Active,
    Suspended,
    Frozen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X402AgentLifecycle {
    pub tenant_id: TenantId,
    pub agent_id: AgentId,
    pub status: AgentLifecycleStatus,
    pub reason_code: Option<String>,
    pub updated_at: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub tenant_id: TenantId,
    pub escalation_id: EscalationId,
    pub gate_id: GateId,
    pub agent_id: AgentId,
    pub status: EscalationStatus,
    pub reason_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub tenant_id: TenantId,
    pub id: OutboxMessageId,
    pub message_type: String,
    pub at: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub next_attempt_at: String,
    pub delivered_at: Option<String>,
    pub dead: bool,
    pub dispatch_id: Option<DispatchId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub tenant_id: TenantId,
    pub key: String,
    pub request_fingerprint: String,
    pub response: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Locked,
    Released,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunSettlement {
    pub tenant_id: TenantId,
    pub settlement_id: SettlementId,
    pub run_id: RunId,
    pub status: SettlementStatus,
    pub amount_cents: Cents,
    pub revision: u64,
}
