//! Idempotency-key bookkeeping shared by every mutating endpoint
//! (spec §4.6, §7: `IDEMPOTENCY_KEY_REQUIRED` / `IDEMPOTENCY_KEY_CONFLICT`).

use crate::error::{OutboxError, OutboxResult};
use nooterra_crypto::sha256_of_value;
use nooterra_store::{CommitTx, IdempotencyRecord, Op, Store};
use nooterra_types::TenantId;
use serde_json::Value;

/// What the caller should do with a request carrying an idempotency key.
pub enum IdempotencyCheck {
    /// No record yet; proceed and call [`record_response`] once a response
    /// is produced.
    Fresh,
    /// Same key, same request body, already answered - replay the stored
    /// response rather than re-executing the mutation.
    Replay(Value),
}

/// Looks up `key` for `tenant_id`, hashing `request_body` to detect a
/// conflicting replay (same key, different body).
pub async fn check_idempotency_key(
    store: &dyn Store,
    tenant_id: &TenantId,
    key: Option<&str>,
    request_body: &Value,
) -> OutboxResult<IdempotencyCheck> {
    let key = key.ok_or(OutboxError::IdempotencyKeyRequired)?;
    let fingerprint = sha256_of_value(request_body).map_err(|_| OutboxError::IdempotencyKeyRequired)?;

    match store.get_idempotency_record(tenant_id, key).await? {
        None => Ok(IdempotencyCheck::Fresh),
        Some(record) if record.request_fingerprint == fingerprint => {
            Ok(IdempotencyCheck::Replay(record.response))
        }
        Some(_) => Err(OutboxError::IdempotencyKeyConflict(key.to_string())),
    }
}

pub async fn record_response(
    store: &dyn Store,
    tenant_id: &TenantId,
    key: &str,
    request_body: &Value,
    response: Value,
    now: &str,
) -> OutboxResult<()> {
    let fingerprint = sha256_of_value(request_body).map_err(|_| OutboxError::IdempotencyKeyRequired)?;
    store
        .commit_tx(CommitTx {
            at: now.to_string(),
            ops: vec![Op::IdempotencyPut(IdempotencyRecord {
                tenant_id: tenant_id.clone(),
                key: key.to_string(),
                request_fingerprint: fingerprint,
                response,
                created_at: now.to_string(),
            })],
        })
        .await?;
    Ok(())
}
