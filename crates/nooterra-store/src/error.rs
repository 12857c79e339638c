use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("optimistic concurrency conflict on {entity} {id}: expected revision {expected}, found {found}")]
    RevisionConflict {
        entity: String,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
