//! Small header/query extraction helpers shared by every handler.

use crate::error::ApiError;
use axum::http::HeaderMap;
use nooterra_types::{ErrorCode, TenantId};

pub const TENANT_HEADER: &str = "x-proxy-tenant-id";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
pub const EXPECTED_PREV_CHAIN_HASH_HEADER: &str = "x-proxy-expected-prev-chain-hash";

pub fn tenant_id(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(TenantId::new)
        .ok_or_else(|| ApiError::new(ErrorCode::AuthRequired, "missing X-Proxy-Tenant-Id header"))
}

pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn expected_prev_chain_hash(headers: &HeaderMap) -> Option<String> {
    headers
        .get(EXPECTED_PREV_CHAIN_HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
