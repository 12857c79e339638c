//! Deterministic `{path → bytes}` assembly and `manifest.json` (spec §4.7).

use crate::error::{BundleError, BundleResult};
use nooterra_crypto::{canonicalize_value, sha256_hex};
use nooterra_types::{BundleScope, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single bundle file. `path` is relative to the bundle root, forward-slash
/// separated (e.g. `payload/job_summary.json`).
#[derive(Debug, Clone)]
pub struct BundleFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl BundleFile {
    /// Canonicalizes `value` and appends a trailing newline, per the
    /// determinism rule every JSON file in a bundle follows.
    pub fn json(path: impl Into<String>, value: &Value) -> BundleResult<Self> {
        let mut canonical = canonicalize_value(value)?;
        canonical.push('\n');
        Ok(Self {
            path: path.into(),
            bytes: canonical.into_bytes(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleKind {
    #[serde(rename = "JobProofBundle.v1")]
    JobProofBundle,
    #[serde(rename = "MonthProofBundle.v1")]
    MonthProofBundle,
    #[serde(rename = "FinancePackBundle.v1")]
    FinancePackBundle,
    #[serde(rename = "InvoiceBundle.v1")]
    InvoiceBundle,
    #[serde(rename = "ClosePack.v1")]
    ClosePack,
}

impl BundleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleKind::JobProofBundle => "JobProofBundle.v1",
            BundleKind::MonthProofBundle => "MonthProofBundle.v1",
            BundleKind::FinancePackBundle => "FinancePackBundle.v1",
            BundleKind::InvoiceBundle => "InvoiceBundle.v1",
            BundleKind::ClosePack => "ClosePack.v1",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFileEntry {
    pub name: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingInfo {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "fileOrder")]
    pub file_order: String,
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub scope: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub protocol: String,
    pub hashing: HashingInfo,
    pub files: Vec<ManifestFileEntry>,
    #[serde(rename = "manifestHash", skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
}

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// `verify/**` never enters the manifest, so the verification report can
/// reference `manifestHash` without circularity.
fn is_excluded(path: &str) -> bool {
    path.starts_with("verify/")
}

/// Sorts `files` lexicographically by path, rejects duplicates, and builds
/// `manifest.json` with its `manifestHash` computed over the manifest
/// without that field.
pub fn build_manifest(
    kind: BundleKind,
    tenant_id: &TenantId,
    scope: &BundleScope,
    created_at: &str,
    protocol: &str,
    mut files: Vec<BundleFile>,
) -> BundleResult<(Manifest, Vec<BundleFile>)> {
    if files.is_empty() {
        return Err(BundleError::Empty);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    for window in files.windows(2) {
        if window[0].path == window[1].path {
            return Err(BundleError::DuplicatePath(window[0].path.clone()));
        }
    }

    let entries: Vec<ManifestFileEntry> = files
        .iter()
        .filter(|f| !is_excluded(&f.path))
        .map(|f| ManifestFileEntry {
            name: f.path.clone(),
            sha256: sha256_hex(&f.bytes),
            bytes: f.bytes.len() as u64,
        })
        .collect();

    let mut manifest = Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        kind: kind.as_str().to_string(),
        tenant_id: tenant_id.as_str().to_string(),
        scope: scope.as_str().to_string(),
        created_at: created_at.to_string(),
        protocol: protocol.to_string(),
        hashing: HashingInfo {
            schema_version: MANIFEST_SCHEMA_VERSION,
            file_order: "path_asc".to_string(),
            excludes: vec!["verify/**".to_string()],
        },
        files: entries,
        manifest_hash: None,
    };

    let unsigned_value = serde_json::to_value(&manifest).map_err(|_| BundleError::Empty)?;
    let manifest_hash = sha256_hex(canonicalize_value(&unsigned_value)?.as_bytes());
    manifest.manifest_hash = Some(manifest_hash);

    Ok((manifest, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_sorted_lexicographically() {
        let files = vec![
            BundleFile { path: "b.json".into(), bytes: b"b".to_vec() },
            BundleFile { path: "a.json".into(), bytes: b"a".to_vec() },
        ];
        let (manifest, sorted) = build_manifest(
            BundleKind::JobProofBundle,
            &TenantId::new("t1"),
            &BundleScope::new("job_1"),
            "2026-01-01T00:00:00Z",
            "nooterra/1",
            files,
        )
        .unwrap();
        assert_eq!(sorted[0].path, "a.json");
        assert_eq!(manifest.files[0].name, "a.json");
    }

    #[test]
    fn verify_prefixed_files_excluded_from_manifest() {
        let files = vec![
            BundleFile { path: "payload/x.json".into(), bytes: b"1".to_vec() },
            BundleFile { path: "verify/verification_report.json".into(), bytes: b"2".to_vec() },
        ];
        let (manifest, _) = build_manifest(
            BundleKind::JobProofBundle,
            &TenantId::new("t1"),
            &BundleScope::new("job_1"),
            "2026-01-01T00:00:00Z",
            "nooterra/1",
            files,
        )
        .unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].name, "payload/x.json");
    }

    #[test]
    fn duplicate_paths_rejected() {
        let files = vec![
            BundleFile { path: "a.json".into(), bytes: b"1".to_vec() },
            BundleFile { path: "a.json".into(), bytes: b"2".to_vec() },
        ];
        let result = build_manifest(
            BundleKind::JobProofBundle,
            &TenantId::new("t1"),
            &BundleScope::new("job_1"),
            "2026-01-01T00:00:00Z",
            "nooterra/1",
            files,
        );
        assert!(result.is_err());
    }
}
