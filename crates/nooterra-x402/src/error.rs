use nooterra_store::StoreError;
use nooterra_types::{EscalationId, GateId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum X402Error {
    #[error("gate {0} not found")]
    GateNotFound(GateId),
    #[error("payer agent is frozen")]
    AgentFrozen,
    #[error("gate {gate_id} is {found:?}, expected {expected:?}")]
    InvalidState {
        gate_id: GateId,
        expected: &'static str,
        found: &'static str,
    },
    #[error("wallet policy not found for this sponsor wallet")]
    WalletPolicyNotFound,
    #[error("wallet policy is suspended")]
    WalletPolicySuspended,
    #[error("authorization requires escalation {0}")]
    EscalationRequired(EscalationId),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type X402Result<T> = Result<T, X402Error>;
