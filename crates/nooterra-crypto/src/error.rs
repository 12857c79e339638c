use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

impl From<CryptoError> for SignatureError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKeyFormat(m) => SignatureError::InvalidKeyFormat(m),
            CryptoError::SigningFailed(m) => SignatureError::SigningFailed(m),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyReasonCode {
    #[error("signature bytes are malformed")]
    MalformedSignature,
    #[error("public key is unknown or malformed")]
    UnknownOrMalformedKey,
    #[error("signature does not verify over the bound envelope")]
    SignatureMismatch,
    #[error("signature purpose does not match the verification context")]
    PurposeMismatch,
    #[error("signature context does not match the verification context")]
    ContextMismatch,
}

#[derive(Debug, Error)]
#[error("signature verification failed: {reason}")]
pub struct VerifyError {
    pub reason: VerifyReasonCode,
}

impl VerifyError {
    pub fn new(reason: VerifyReasonCode) -> Self {
        Self { reason }
    }
}
