//! The three-step governance verification chain (spec §4.8): policy
//! signature against the root key, revocation-list reference and
//! signature, then per-signed-object key/scope/revocation checks.

use crate::error::{GovernanceError, GovernanceResult};
use crate::policy::{GovernancePolicy, PolicyScope, RevocationList, SignedArtifact};
use nooterra_crypto::{canonicalize_value, sha256_hex, verify_envelope, PublicKey, SigningPurpose};

fn unsigned_hash(mut value: serde_json::Value, drop_fields: &[&str]) -> Option<String> {
    let obj = value.as_object_mut()?;
    for field in drop_fields {
        obj.remove(*field);
    }
    canonicalize_value(&value).ok().map(|s| sha256_hex(s.as_bytes()))
}

/// Step 1: the policy's own signature, under the root key.
pub fn verify_policy_signature(policy: &GovernancePolicy, root_public_key: &PublicKey) -> GovernanceResult<()> {
    let value = serde_json::to_value(policy).map_err(|_| GovernanceError::PolicySignatureInvalid)?;
    let hash = unsigned_hash(value, &["signature", "signerKeyId"])
        .ok_or(GovernanceError::PolicySignatureInvalid)?;
    let raw_hash = hex::decode(&hash).map_err(|_| GovernanceError::PolicySignatureInvalid)?;
    let context = serde_json::json!({ "policyId": policy.policy_id });
    verify_envelope(
        &raw_hash,
        SigningPurpose::GovernancePolicy,
        &context,
        &policy.signature,
        root_public_key,
    )
    .map_err(|_| GovernanceError::PolicySignatureInvalid)
}

/// Step 2a: the policy references this exact revocation list by path+hash.
pub fn verify_revocation_ref(policy: &GovernancePolicy, revocation_list_path: &str, revocation_list_bytes: &[u8]) -> GovernanceResult<()> {
    if policy.revocation_list_ref.path != revocation_list_path {
        return Err(GovernanceError::RevocationRefMismatch);
    }
    let actual_sha256 = sha256_hex(revocation_list_bytes);
    if policy.revocation_list_ref.sha256 != actual_sha256 {
        return Err(GovernanceError::RevocationRefMismatch);
    }
    Ok(())
}

/// Step 2b: the revocation list's own signature, under the same root key.
pub fn verify_revocation_list_signature(list: &RevocationList, root_public_key: &PublicKey) -> GovernanceResult<()> {
    let value = serde_json::to_value(list).map_err(|_| GovernanceError::RevocationListSignatureInvalid)?;
    let hash = unsigned_hash(value, &["signature", "signerKeyId"])
        .ok_or(GovernanceError::RevocationListSignatureInvalid)?;
    let raw_hash = hex::decode(&hash).map_err(|_| GovernanceError::RevocationListSignatureInvalid)?;
    let context = serde_json::json!({});
    verify_envelope(
        &raw_hash,
        SigningPurpose::RevocationList,
        &context,
        &list.signature,
        root_public_key,
    )
    .map_err(|_| GovernanceError::RevocationListSignatureInvalid)
}

/// Step 3: a single signed object (a bundle's head attestation or
/// verification report) is allowed for its subject type, not revoked as of
/// `signed_at`, and (if the subject is tenant-scoped) bound to `tenant_id`.
pub fn verify_signed_object(
    policy: &GovernancePolicy,
    revocation_list: &RevocationList,
    bundle_kind: &str,
    artifact: SignedArtifact,
    signer_key_id: &str,
    signed_at: &str,
    tenant_id: Option<&str>,
) -> GovernanceResult<()> {
    let subject = policy
        .subject_for(bundle_kind)
        .ok_or_else(|| GovernanceError::SubjectNotCovered(bundle_kind.to_string()))?;

    if subject.scope == PolicyScope::Tenant && tenant_id.is_none() {
        return Err(GovernanceError::SignerNotAuthorized(signer_key_id.to_string()));
    }

    if !subject.allowed_key_ids(artifact).iter().any(|k| k == signer_key_id) {
        return Err(GovernanceError::SignerNotAuthorized(signer_key_id.to_string()));
    }

    if let Some(revoked_at) = revocation_list.revoked_at(signer_key_id) {
        if revoked_at <= signed_at {
            return Err(GovernanceError::SignerRevoked {
                key_id: signer_key_id.to_string(),
                revoked_at: revoked_at.to_string(),
                signed_at: signed_at.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicySubject, RevocationListRef, RevokedKey};

    fn policy_with_subject(subject: PolicySubject) -> GovernancePolicy {
        GovernancePolicy {
            schema_version: 2,
            policy_id: "pol_1".into(),
            revocation_list_ref: RevocationListRef {
                path: "governance/revocations.json".into(),
                sha256: "deadbeef".into(),
            },
            subjects: vec![subject],
            signature: "sig".into(),
            signer_key_id: "root".into(),
        }
    }

    fn subject() -> PolicySubject {
        PolicySubject {
            bundle_kind: "JobProofBundle.v1".into(),
            allowed_head_attestation_key_ids: vec!["key_a".into()],
            allowed_verification_report_key_ids: vec!["key_a".into()],
            scope: PolicyScope::Global,
            require_governed: true,
            required_purpose: None,
        }
    }

    #[test]
    fn unauthorized_signer_rejected() {
        let policy = policy_with_subject(subject());
        let revocations = RevocationList {
            schema_version: 1,
            entries: vec![],
            signature: "sig".into(),
            signer_key_id: "root".into(),
        };
        let result = verify_signed_object(
            &policy,
            &revocations,
            "JobProofBundle.v1",
            SignedArtifact::BundleHeadAttestation,
            "key_unknown",
            "2026-01-01T00:00:00Z",
            None,
        );
        assert!(matches!(result, Err(GovernanceError::SignerNotAuthorized(_))));
    }

    #[test]
    fn revoked_before_signing_rejected() {
        let policy = policy_with_subject(subject());
        let revocations = RevocationList {
            schema_version: 1,
            entries: vec![RevokedKey {
                key_id: "key_a".into(),
                revoked_at: "2025-01-01T00:00:00Z".into(),
            }],
            signature: "sig".into(),
            signer_key_id: "root".into(),
        };
        let result = verify_signed_object(
            &policy,
            &revocations,
            "JobProofBundle.v1",
            SignedArtifact::BundleHeadAttestation,
            "key_a",
            "2026-01-01T00:00:00Z",
            None,
        );
        assert!(matches!(result, Err(GovernanceError::SignerRevoked { .. })));
    }

    #[test]
    fn allowed_and_not_revoked_passes() {
        let policy = policy_with_subject(subject());
        let revocations = RevocationList {
            schema_version: 1,
            entries: vec![],
            signature: "sig".into(),
            signer_key_id: "root".into(),
        };
        let result = verify_signed_object(
            &policy,
            &revocations,
            "JobProofBundle.v1",
            SignedArtifact::BundleHeadAttestation,
            "key_a",
            "2026-01-01T00:00:00Z",
            None,
        );
        assert!(result.is_ok());
    }
}
