use nooterra_crypto::{CanonicalizeError, SignatureError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle contains no content files")]
    Empty,
    #[error("duplicate file path: {0}")]
    DuplicatePath(String),
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] CanonicalizeError),
    #[error("signing failed: {0}")]
    Signature(#[from] SignatureError),
    #[error("file {0} is not valid JSON and cannot be canonicalized")]
    NotJson(String),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BundleResult<T> = Result<T, BundleError>;
