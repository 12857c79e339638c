use thiserror::Error;

/// Why a chain failed to verify at a given index (spec §4.2). Fatal at
/// verify time; never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainIntegrityReason {
    PrevChainHashMismatch,
    PayloadHashMismatch,
    ChainHashMismatch,
    SignatureInvalid,
    UnknownSignerKeyId,
    MissingSignerKeyId,
}

impl ChainIntegrityReason {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::PrevChainHashMismatch => "prevChainHashMismatch",
            Self::PayloadHashMismatch => "payloadHashMismatch",
            Self::ChainHashMismatch => "chainHashMismatch",
            Self::SignatureInvalid => "signatureInvalid",
            Self::UnknownSignerKeyId => "unknownSignerKeyId",
            Self::MissingSignerKeyId => "missingSignerKeyId",
        }
    }
}

#[derive(Debug, Error)]
#[error("chain integrity violation at index {index}: {reason}")]
pub struct ChainIntegrityError {
    pub index: usize,
    pub reason: ChainIntegrityReason,
}

impl std::fmt::Display for ChainIntegrityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

#[derive(Debug, Error)]
pub enum AppendError {
    #[error("draft's stream id does not match the prior event's stream id")]
    StreamIdMismatch,
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] nooterra_crypto::CanonicalizeError),
    #[error("signing failed: {0}")]
    Signing(#[from] nooterra_crypto::SignatureError),
}
