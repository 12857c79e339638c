use nooterra_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("idempotency key is required for this request")]
    IdempotencyKeyRequired,
    #[error("idempotency key {0} was already used with a different request body")]
    IdempotencyKeyConflict(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("x402 error: {0}")]
    X402(#[from] nooterra_x402::X402Error),
    #[error("webhook delivery failed: {0}")]
    DeliveryFailed(String),
}

pub type OutboxResult<T> = Result<T, OutboxError>;
