//! The x402 payment gate: state machine, wallet policy evaluation, and the
//! insolvency/wind-down sweep (spec §4.5).

pub mod error;
pub mod gate;
pub mod insolvency;
pub mod reversal;
pub mod wallet_policy;

pub use error::{X402Error, X402Result};
pub use gate::{
    AuthorizeInput, AuthorizeOutcome, CreateGateInput, ProofPolicy, QuoteInput, VerificationOutcome,
    VerifyInput, VerifyResult,
};
pub use insolvency::{InsolvencyReason, WindDownOutcome};
pub use reversal::ReversalDispatchResult;
pub use wallet_policy::{AuthorizationRequest, PolicyVerdict};
