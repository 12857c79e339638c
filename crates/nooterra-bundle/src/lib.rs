//! Deterministic proof-bundle assembly (spec §4.7): manifest, head
//! attestation, verification report, and composite embedding for
//! `JobProofBundle.v1`, `MonthProofBundle.v1`, `FinancePackBundle.v1`,
//! `InvoiceBundle.v1`, `ClosePack.v1`.

pub mod attestation;
pub mod composite;
pub mod error;
pub mod manifest;
pub mod verification;

pub use attestation::{build_attestation, BundleHeadAttestation};
pub use composite::{embed_child, INVOICE_EMBED_PREFIX, JOB_PROOF_EMBED_PREFIX, MONTH_PROOF_EMBED_PREFIX};
pub use error::{BundleError, BundleResult};
pub use manifest::{build_manifest, BundleFile, BundleKind, Manifest};
pub use verification::{build_verification_report, ToolProvenance, VerificationReport};

use nooterra_crypto::Signer;
use nooterra_types::{BundleScope, TenantId};
use serde_json::Value;

pub struct AssembleInput {
    pub kind: BundleKind,
    pub tenant_id: TenantId,
    pub scope: BundleScope,
    pub generated_at: String,
    pub protocol: String,
    pub content_files: Vec<BundleFile>,
    pub heads: Value,
    pub verification_inputs: Value,
    pub tool: ToolProvenance,
}

/// Builds a complete bundle: content files (sorted, deduped), `manifest.json`,
/// the signed head attestation, and the verification report, in that order.
pub async fn assemble(signer: &dyn Signer, input: AssembleInput) -> BundleResult<Vec<BundleFile>> {
    let (manifest, content_files) = build_manifest(
        input.kind,
        &input.tenant_id,
        &input.scope,
        &input.generated_at,
        &input.protocol,
        input.content_files,
    )?;
    let manifest_hash = manifest.manifest_hash.clone().unwrap_or_default();
    let manifest_file = BundleFile::json("manifest.json", &serde_json::to_value(&manifest)?)?;

    let attestation_file = build_attestation(
        signer,
        input.kind,
        &input.tenant_id,
        &input.scope,
        &input.generated_at,
        &manifest_hash,
        input.heads,
    )
    .await?;
    let attestation: BundleHeadAttestation = serde_json::from_slice(&attestation_file.bytes)?;

    let verification_file = build_verification_report(
        &manifest_hash,
        &attestation,
        input.verification_inputs,
        input.tool,
    )?;

    let mut out = content_files;
    out.push(manifest_file);
    out.push(attestation_file);
    out.push(verification_file);
    Ok(out)
}
