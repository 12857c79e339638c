//! Opaque identifier types.
//!
//! Identifiers in Nooterra are opaque strings assigned by callers or
//! generated by the core (never database surrogate keys leaking out). Each
//! id type is a thin newtype so the compiler stops callers from passing a
//! `GateId` where a `SessionId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type!(TenantId, "Identifies the owning tenant of every entity in the store");
define_id_type!(AgentId, "Identifies an autonomous agent, payer or payee");
define_id_type!(SessionId, "Identifies a collaboration session and its event stream");
define_id_type!(StreamId, "Identifies an append-only chained event stream");
define_id_type!(EventId, "Identifies a single chained event within a stream");
define_id_type!(GateId, "Identifies a single x402 payment gate");
define_id_type!(QuoteId, "Identifies a gate's quote");
define_id_type!(EscalationId, "Identifies a paused wallet authorization decision");
define_id_type!(SponsorRef, "Identifies the sponsor that funds a wallet");
define_id_type!(SponsorWalletRef, "Identifies a sponsor-owned wallet");
define_id_type!(PolicyRef, "Identifies a wallet authorization policy document");
define_id_type!(ToolId, "Identifies a paid tool a gate is invoked against");
define_id_type!(OutboxMessageId, "Identifies a durable outbox row");
define_id_type!(DispatchId, "Deterministic id used to dedupe reversal dispatch");
define_id_type!(WindDownId, "Identifies a single wind-down sweep invocation");
define_id_type!(SettlementId, "Identifies an agent-run escrow settlement");
define_id_type!(RunId, "Identifies an agent run an escrow settlement covers");
define_id_type!(SignerKeyId, "Identifies an Ed25519 signing key");
define_id_type!(BundleScope, "Opaque scope label bound into a proof bundle (e.g. a job or month id)");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_through_serde() {
        let id = StreamId::new("session:abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"session:abc\"");
        let back: StreamId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn distinct_types_do_not_unify() {
        let gate = GateId::new("gate_1");
        let quote = QuoteId::new("quote_1");
        assert_ne!(gate.as_str(), quote.as_str());
    }
}
