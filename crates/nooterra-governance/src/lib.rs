//! Governance policy and revocation-list verification (spec §4.8).

pub mod error;
pub mod policy;
pub mod verify;

pub use error::{GovernanceError, GovernanceResult};
pub use policy::{GovernancePolicy, PolicyScope, PolicySubject, RevocationList, RevocationListRef, RevokedKey, SignedArtifact};
pub use verify::{verify_policy_signature, verify_revocation_list_signature, verify_revocation_ref, verify_signed_object};
