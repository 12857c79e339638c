use nooterra_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("governance policy signature missing or invalid")]
    PolicySignatureInvalid,
    #[error("policy's revocation list reference does not match the bundled revocation list")]
    RevocationRefMismatch,
    #[error("revocation list signature missing or invalid")]
    RevocationListSignatureInvalid,
    #[error("no policy subject covers bundle kind {0}")]
    SubjectNotCovered(String),
    #[error("signer key {0} is not authorized for this subject/purpose")]
    SignerNotAuthorized(String),
    #[error("signer key {key_id} was revoked at {revoked_at}, before signedAt {signed_at}")]
    SignerRevoked {
        key_id: String,
        revoked_at: String,
        signed_at: String,
    },
}

impl GovernanceError {
    /// The `GOVERNANCE_*` reason code this failure maps to (spec §4.8).
    pub fn reason_code(&self) -> &'static str {
        match self {
            GovernanceError::PolicySignatureInvalid => "GOVERNANCE_POLICY_SIGNATURE_INVALID",
            GovernanceError::RevocationRefMismatch => "GOVERNANCE_REVOCATION_REF_MISMATCH",
            GovernanceError::RevocationListSignatureInvalid => "GOVERNANCE_REVOCATION_LIST_SIGNATURE_INVALID",
            GovernanceError::SubjectNotCovered(_) => "GOVERNANCE_SUBJECT_NOT_COVERED",
            GovernanceError::SignerNotAuthorized(_) => "GOVERNANCE_SIGNER_NOT_AUTHORIZED",
            GovernanceError::SignerRevoked { .. } => "GOVERNANCE_SIGNER_REVOKED",
        }
    }

    /// The closed API-level code the two signature failures share with
    /// the rest of the taxonomy (spec §7); the others are governance-only
    /// and surface through `reason_code` instead.
    pub fn api_error_code(&self) -> Option<ErrorCode> {
        match self {
            GovernanceError::PolicySignatureInvalid => Some(ErrorCode::GovernancePolicySignatureRequired),
            GovernanceError::RevocationRefMismatch => Some(ErrorCode::GovernancePolicyRevocationRefMismatch),
            GovernanceError::RevocationListSignatureInvalid => Some(ErrorCode::RevocationListSignatureRequired),
            _ => None,
        }
    }
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;
