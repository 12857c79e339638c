//! The machine-readable error taxonomy shared by every layer (spec §7).
//!
//! Core crates raise their own `thiserror` enums; at the API boundary those
//! get mapped into this closed `ErrorCode` set plus an HTTP status. Keeping
//! the taxonomy here (rather than duplicated per-crate) is what lets the
//! chain, x402, and bundle crates agree on the same wire vocabulary without
//! depending on axum.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SchemaInvalid,
    IdempotencyKeyRequired,
    IdempotencyKeyConflict,
    AuthRequired,
    AuthForbidden,
    SessionEventCursorConflict,
    SessionEventCursorInvalid,
    X402AuthorizationEscalationRequired,
    FederationDisputeJurisdictionPolicyMismatch,
    PricingMatrixSignaturePayloadMismatch,
    X402AgentFrozen,
    GovernancePolicySignatureRequired,
    GovernancePolicyRevocationRefMismatch,
    RevocationListSignatureRequired,
    JobProofHeadAttestationRequired,
    MonthProofAttestationRequired,
    AgentCardPublicDiscoveryRateLimited,
    Internal,
}

impl ErrorCode {
    /// Default HTTP status for this code, per the §7 taxonomy table.
    pub fn http_status(self) -> u16 {
        use ErrorCode::*;
        match self {
            SchemaInvalid => 400,
            IdempotencyKeyRequired => 400,
            IdempotencyKeyConflict => 409,
            AuthRequired => 401,
            AuthForbidden => 403,
            SessionEventCursorConflict => 409,
            SessionEventCursorInvalid => 409,
            X402AuthorizationEscalationRequired => 409,
            FederationDisputeJurisdictionPolicyMismatch => 409,
            PricingMatrixSignaturePayloadMismatch => 409,
            X402AgentFrozen => 410,
            GovernancePolicySignatureRequired => 422,
            GovernancePolicyRevocationRefMismatch => 422,
            RevocationListSignatureRequired => 422,
            JobProofHeadAttestationRequired => 422,
            MonthProofAttestationRequired => 422,
            AgentCardPublicDiscoveryRateLimited => 429,
            Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", json.trim_matches('"'))
    }
}

/// The `{code, message, details?}` tuple every API error response carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_matches_spec() {
        assert_eq!(ErrorCode::X402AgentFrozen.http_status(), 410);
        assert_eq!(ErrorCode::IdempotencyKeyRequired.http_status(), 400);
        assert_eq!(
            ErrorCode::X402AuthorizationEscalationRequired.http_status(),
            409
        );
    }

    #[test]
    fn display_renders_screaming_snake() {
        assert_eq!(ErrorCode::X402AgentFrozen.to_string(), "X402_AGENT_FROZEN");
    }
}
