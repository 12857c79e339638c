//! `verify/verification_report.json` (spec §4.7) - emitted last, excluded
//! from the manifest it references.

use crate::attestation::BundleHeadAttestation;
use crate::error::BundleResult;
use crate::manifest::BundleFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool provenance the report carries. Either field may be unknown (a
/// non-release build, or a checkout with no commit info); callers surface
/// an explicit warning in that case rather than fabricating data.
pub struct ToolProvenance {
    pub version: Option<String>,
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    #[serde(rename = "manifestHash")]
    pub manifest_hash: String,
    #[serde(rename = "bundleHeadAttestation")]
    pub bundle_head_attestation: BundleHeadAttestation,
    pub inputs: Value,
    #[serde(rename = "toolVersion")]
    pub tool_version: String,
    #[serde(rename = "toolCommit")]
    pub tool_commit: String,
    pub warnings: Vec<String>,
}

pub fn build_verification_report(
    manifest_hash: &str,
    bundle_head_attestation: &BundleHeadAttestation,
    inputs: Value,
    tool: ToolProvenance,
) -> BundleResult<BundleFile> {
    let mut warnings = Vec::new();
    let tool_version = tool.version.unwrap_or_else(|| {
        warnings.push("TOOL_VERSION_UNKNOWN".to_string());
        "unknown".to_string()
    });
    let tool_commit = tool.commit.unwrap_or_else(|| {
        warnings.push("TOOL_COMMIT_UNKNOWN".to_string());
        "unknown".to_string()
    });

    let report = VerificationReport {
        manifest_hash: manifest_hash.to_string(),
        bundle_head_attestation: bundle_head_attestation.clone(),
        inputs,
        tool_version,
        tool_commit,
        warnings,
    };

    BundleFile::json("verify/verification_report.json", &serde_json::to_value(&report)?)
}
