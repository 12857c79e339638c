//! `attestation/bundle_head_attestation.json` (spec §4.7).

use crate::error::BundleResult;
use crate::manifest::{BundleFile, BundleKind};
use nooterra_crypto::{canonicalize_value, sha256_hex, Signer, SigningPurpose};
use nooterra_types::{BundleScope, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleHeadAttestation {
    pub kind: String,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub scope: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    #[serde(rename = "manifestHash")]
    pub manifest_hash: String,
    pub heads: Value,
    #[serde(rename = "attestationHash")]
    pub attestation_hash: String,
    pub signature: String,
    #[serde(rename = "signerKeyId")]
    pub signer_key_id: String,
}

/// Binds `{kind, tenantId, scope, generatedAt, manifestHash, heads}` and
/// signs the resulting `attestationHash` under
/// [`SigningPurpose::BundleHeadAttestation`].
pub async fn build_attestation(
    signer: &dyn Signer,
    kind: BundleKind,
    tenant_id: &TenantId,
    scope: &BundleScope,
    generated_at: &str,
    manifest_hash: &str,
    heads: Value,
) -> BundleResult<BundleFile> {
    let unsigned = serde_json::json!({
        "kind": kind.as_str(),
        "tenantId": tenant_id.as_str(),
        "scope": scope.as_str(),
        "generatedAt": generated_at,
        "manifestHash": manifest_hash,
        "heads": heads,
    });
    let attestation_hash = sha256_hex(canonicalize_value(&unsigned)?.as_bytes());
    let raw_hash = hex::decode(&attestation_hash).unwrap_or_default();

    let context = serde_json::json!({
        "tenantId": tenant_id.as_str(),
        "scope": scope.as_str(),
    });
    let signed = signer
        .sign(&raw_hash, SigningPurpose::BundleHeadAttestation, &context)
        .await?;

    let attestation = BundleHeadAttestation {
        kind: kind.as_str().to_string(),
        tenant_id: tenant_id.as_str().to_string(),
        scope: scope.as_str().to_string(),
        generated_at: generated_at.to_string(),
        manifest_hash: manifest_hash.to_string(),
        heads,
        attestation_hash,
        signature: signed.signature_base64,
        signer_key_id: signed.signer_key_id,
    };

    BundleFile::json("attestation/bundle_head_attestation.json", &serde_json::to_value(&attestation)?)
}
