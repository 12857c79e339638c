//! Wallet authorization policy evaluation (spec §4.5 `authorize`).

use nooterra_store::{ReversalAction, WalletAuthorizationDecisionToken, WalletPolicyStatus, X402WalletPolicy};
use nooterra_types::{Cents, Currency, GateId, QuoteId};

pub struct AuthorizationRequest<'a> {
    pub sponsor_wallet_ref_token: &'a str,
    pub gate_id: GateId,
    pub quote_id: Option<QuoteId>,
    pub idempotency_key: &'a str,
    pub amount_cents: Cents,
    pub currency: &'a Currency,
    pub payee_agent_id: &'a nooterra_types::AgentId,
    pub tool_id: Option<&'a nooterra_types::ToolId>,
    pub todays_authorizations: Cents,
}

/// `Allow` carries the signed decision token; `Escalate` carries the reason
/// code recorded on the paused escalation.
pub enum PolicyVerdict {
    Allow(WalletAuthorizationDecisionToken),
    Escalate(&'static str),
}

/// Evaluates a wallet authorization request against its policy. Checks run
/// in a fixed order: suspension, amount cap, currency, provider, tool,
/// then the daily cap.
pub fn evaluate_authorization(
    policy: &X402WalletPolicy,
    request: &AuthorizationRequest<'_>,
) -> PolicyVerdict {
    if policy.status != WalletPolicyStatus::Active {
        return PolicyVerdict::Escalate("WALLET_POLICY_SUSPENDED");
    }
    if request.amount_cents.0 > policy.max_amount_cents.0 {
        return PolicyVerdict::Escalate("AMOUNT_EXCEEDS_MAX");
    }
    if !policy.allowed_currencies.contains(request.currency) {
        return PolicyVerdict::Escalate("CURRENCY_NOT_ALLOWED");
    }
    if !policy.allowed_provider_ids.contains(request.payee_agent_id) {
        return PolicyVerdict::Escalate("PROVIDER_NOT_ALLOWED");
    }
    if let Some(tool_id) = request.tool_id {
        if !policy.allowed_tool_ids.contains(tool_id) {
            return PolicyVerdict::Escalate("TOOL_NOT_ALLOWED");
        }
    }
    let projected = request.todays_authorizations.0 + request.amount_cents.0;
    if projected > policy.max_daily_authorization_cents.0 {
        return PolicyVerdict::Escalate("DAILY_LIMIT_EXCEEDED");
    }

    // `signature`/`signer_key_id` are filled in by the caller, which alone
    // holds the `Signer` capability; this function stays a plain sync
    // policy check so it is unit-testable without a signer in hand.
    PolicyVerdict::Allow(WalletAuthorizationDecisionToken {
        token: format!("watk_{}", ulid::Ulid::new()),
        sponsor_wallet_ref: policy.sponsor_wallet_ref.clone(),
        gate_id: request.gate_id.clone(),
        quote_id: request.quote_id.clone(),
        idempotency_key: request.idempotency_key.to_string(),
        signature: String::new(),
        signer_key_id: String::new(),
    })
}

/// Whether `action` is permitted by the wallet policy's allow-list, used
/// when dispatching a reversal (spec §4.5 wind-down reversal dispatch).
pub fn allows_reversal_action(policy: &X402WalletPolicy, action: ReversalAction) -> bool {
    policy.allowed_reversal_actions.contains(&action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_types::{AgentId, SponsorRef, SponsorWalletRef, PolicyRef, ToolId};
    use std::collections::BTreeSet;

    fn base_policy() -> X402WalletPolicy {
        X402WalletPolicy {
            sponsor_ref: SponsorRef::new("sponsor_1"),
            sponsor_wallet_ref: SponsorWalletRef::new("wallet_1"),
            policy_ref: PolicyRef::new("policy_1"),
            policy_version: 1,
            status: WalletPolicyStatus::Active,
            max_amount_cents: Cents(10_000),
            max_daily_authorization_cents: Cents(20_000),
            allowed_provider_ids: BTreeSet::from([AgentId::new("payee_1")]),
            allowed_tool_ids: BTreeSet::from([ToolId::new("tool_1")]),
            allowed_currencies: BTreeSet::from([Currency::new("USD")]),
            allowed_reversal_actions: BTreeSet::from([ReversalAction::VoidAuthorization]),
            require_quote: false,
            require_strict_request_binding: false,
            require_agent_key_match: false,
        }
    }

    fn base_request() -> (AgentId, ToolId, Currency) {
        (AgentId::new("payee_1"), ToolId::new("tool_1"), Currency::new("USD"))
    }

    #[test]
    fn allows_within_limits() {
        let policy = base_policy();
        let (payee, tool, currency) = base_request();
        let req = AuthorizationRequest {
            sponsor_wallet_ref_token: "wallet_1",
            gate_id: GateId::new("gate_1"),
            quote_id: None,
            idempotency_key: "idem_1",
            amount_cents: Cents(5_000),
            currency: &currency,
            payee_agent_id: &payee,
            tool_id: Some(&tool),
            todays_authorizations: Cents(0),
        };
        assert!(matches!(evaluate_authorization(&policy, &req), PolicyVerdict::Allow(_)));
    }

    #[test]
    fn escalates_over_max_amount() {
        let policy = base_policy();
        let (payee, tool, currency) = base_request();
        let req = AuthorizationRequest {
            sponsor_wallet_ref_token: "wallet_1",
            gate_id: GateId::new("gate_1"),
            quote_id: None,
            idempotency_key: "idem_1",
            amount_cents: Cents(50_000),
            currency: &currency,
            payee_agent_id: &payee,
            tool_id: Some(&tool),
            todays_authorizations: Cents(0),
        };
        assert!(matches!(
            evaluate_authorization(&policy, &req),
            PolicyVerdict::Escalate("AMOUNT_EXCEEDS_MAX")
        ));
    }

    #[test]
    fn escalates_over_daily_limit() {
        let policy = base_policy();
        let (payee, tool, currency) = base_request();
        let req = AuthorizationRequest {
            sponsor_wallet_ref_token: "wallet_1",
            gate_id: GateId::new("gate_1"),
            quote_id: None,
            idempotency_key: "idem_1",
            amount_cents: Cents(5_000),
            currency: &currency,
            payee_agent_id: &payee,
            tool_id: Some(&tool),
            todays_authorizations: Cents(16_000),
        };
        assert!(matches!(
            evaluate_authorization(&policy, &req),
            PolicyVerdict::Escalate("DAILY_LIMIT_EXCEEDED")
        ));
    }

    #[test]
    fn escalates_when_suspended() {
        let mut policy = base_policy();
        policy.status = WalletPolicyStatus::Suspended;
        let (payee, tool, currency) = base_request();
        let req = AuthorizationRequest {
            sponsor_wallet_ref_token: "wallet_1",
            gate_id: GateId::new("gate_1"),
            quote_id: None,
            idempotency_key: "idem_1",
            amount_cents: Cents(1),
            currency: &currency,
            payee_agent_id: &payee,
            tool_id: Some(&tool),
            todays_authorizations: Cents(0),
        };
        assert!(matches!(
            evaluate_authorization(&policy, &req),
            PolicyVerdict::Escalate("WALLET_POLICY_SUSPENDED")
        ));
    }
}
