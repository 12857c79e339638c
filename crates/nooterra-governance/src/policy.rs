//! `GovernancePolicy.v2` / `RevocationList.v1` document shapes (spec §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    Global,
    Tenant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignedArtifact {
    BundleHeadAttestation,
    VerificationReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySubject {
    #[serde(rename = "bundleKind")]
    pub bundle_kind: String,
    #[serde(rename = "allowedHeadAttestationKeyIds")]
    pub allowed_head_attestation_key_ids: Vec<String>,
    #[serde(rename = "allowedVerificationReportKeyIds")]
    pub allowed_verification_report_key_ids: Vec<String>,
    pub scope: PolicyScope,
    #[serde(rename = "requireGoverned")]
    pub require_governed: bool,
    #[serde(rename = "requiredPurpose", skip_serializing_if = "Option::is_none")]
    pub required_purpose: Option<String>,
}

impl PolicySubject {
    pub fn allowed_key_ids(&self, artifact: SignedArtifact) -> &[String] {
        match artifact {
            SignedArtifact::BundleHeadAttestation => &self.allowed_head_attestation_key_ids,
            SignedArtifact::VerificationReport => &self.allowed_verification_report_key_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationListRef {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernancePolicy {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "policyId")]
    pub policy_id: String,
    #[serde(rename = "revocationListRef")]
    pub revocation_list_ref: RevocationListRef,
    pub subjects: Vec<PolicySubject>,
    pub signature: String,
    #[serde(rename = "signerKeyId")]
    pub signer_key_id: String,
}

impl GovernancePolicy {
    pub fn subject_for(&self, bundle_kind: &str) -> Option<&PolicySubject> {
        self.subjects.iter().find(|s| s.bundle_kind == bundle_kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedKey {
    #[serde(rename = "keyId")]
    pub key_id: String,
    #[serde(rename = "revokedAt")]
    pub revoked_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationList {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub entries: Vec<RevokedKey>,
    pub signature: String,
    #[serde(rename = "signerKeyId")]
    pub signer_key_id: String,
}

impl RevocationList {
    /// `None` if never revoked; otherwise the timestamp revocation took
    /// effect, for comparison against a signature's `signedAt`.
    pub fn revoked_at(&self, key_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key_id == key_id)
            .map(|e| e.revoked_at.as_str())
    }
}
