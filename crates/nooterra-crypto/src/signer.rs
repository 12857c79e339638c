//! Purpose-bound signing envelopes (spec §4.1, §9 "thenable signer").
//!
//! A signature is never produced over raw payload-hash bytes alone: the
//! `purpose` and a small `context` object are folded into the signed
//! material so a signature minted for one purpose (say, a bundle head
//! attestation) can never be replayed as a signature for another (say, a
//! governance policy). Signing is modeled as a capability trait rather than
//! a concrete local implementation so a remote/HTTP/plugin signer is just
//! another `Signer` impl; the log and bundle assembler never know the
//! difference.

use crate::canonical::canonicalize_value;
use crate::error::{CryptoError, SignatureError, VerifyError, VerifyReasonCode};
use crate::keys::{KeyPair, PublicKey};
use async_trait::async_trait;
use ed25519_dalek::{Signature as Ed25519Signature, Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of purposes a signature may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningPurpose {
    EventPayload,
    GovernancePolicy,
    RevocationList,
    TimestampProof,
    PricingMatrix,
    BundleHeadAttestation,
    VerificationReport,
    SettlementDecisionReport,
}

/// What actually gets signed: the purpose, the caller-supplied context, and
/// the hex-encoded payload hash, canonicalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignableEnvelope<'a> {
    purpose: SigningPurpose,
    context: &'a Value,
    #[serde(rename = "payloadHash")]
    payload_hash: String,
}

fn envelope_bytes(
    payload_hash: &[u8],
    purpose: SigningPurpose,
    context: &Value,
) -> Result<Vec<u8>, CryptoError> {
    let envelope = SignableEnvelope {
        purpose,
        context,
        payload_hash: hex::encode(payload_hash),
    };
    let canonical = canonicalize_value(&serde_json::to_value(&envelope).map_err(|e| {
        CryptoError::SigningFailed(format!("envelope not serializable: {e}"))
    })?)
    .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    Ok(canonical.into_bytes())
}

/// Result of a successful signing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub signature_base64: String,
    pub signer_key_id: String,
}

/// The signing capability. Implementations may be local, a remote HTTP
/// signer, or a stdio plugin; the caller never inspects which.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(
        &self,
        payload_hash: &[u8],
        purpose: SigningPurpose,
        context: &Value,
    ) -> Result<SignedEnvelope, SignatureError>;

    fn public_key(&self) -> PublicKey;
    fn key_id(&self) -> String;
}

/// A local Ed25519 signer. The default and only implementation this crate
/// ships; remote transports live in adapter crates and implement the same
/// `Signer` trait.
pub struct LocalSigner {
    keypair: KeyPair,
    key_id: String,
}

impl LocalSigner {
    pub fn new(keypair: KeyPair, key_id: impl Into<String>) -> Self {
        Self {
            keypair,
            key_id: key_id.into(),
        }
    }

    pub fn generate(key_id: impl Into<String>) -> Self {
        Self::new(KeyPair::generate(), key_id)
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign(
        &self,
        payload_hash: &[u8],
        purpose: SigningPurpose,
        context: &Value,
    ) -> Result<SignedEnvelope, SignatureError> {
        let bytes = envelope_bytes(payload_hash, purpose, context)?;
        let signature = self.keypair.signing_key().sign(&bytes);
        Ok(SignedEnvelope {
            signature_base64: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                signature.to_bytes(),
            ),
            signer_key_id: self.key_id.clone(),
        })
    }

    fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }
}

/// Verify a signature was produced for exactly this `(payload_hash, purpose,
/// context)` by the holder of `public_key`.
pub fn verify_envelope(
    payload_hash: &[u8],
    purpose: SigningPurpose,
    context: &Value,
    signature_base64: &str,
    public_key: &PublicKey,
) -> Result<(), VerifyError> {
    let bytes = envelope_bytes(payload_hash, purpose, context)
        .map_err(|_| VerifyError::new(VerifyReasonCode::ContextMismatch))?;

    let sig_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_base64)
        .map_err(|_| VerifyError::new(VerifyReasonCode::MalformedSignature))?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| VerifyError::new(VerifyReasonCode::MalformedSignature))?;
    let signature = Ed25519Signature::from_bytes(&sig_arr);

    let verifying_key = public_key
        .to_verifying_key()
        .map_err(|_| VerifyError::new(VerifyReasonCode::UnknownOrMalformedKey))?;

    verifying_key
        .verify(&bytes, &signature)
        .map_err(|_| VerifyError::new(VerifyReasonCode::SignatureMismatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sign_then_verify_roundtrips() {
        let signer = LocalSigner::generate("key-1");
        let payload_hash = crate::hash::sha256_bytes(b"hello");
        let ctx = json!({"tenantId": "t1"});

        let signed = signer
            .sign(&payload_hash, SigningPurpose::EventPayload, &ctx)
            .await
            .unwrap();

        verify_envelope(
            &payload_hash,
            SigningPurpose::EventPayload,
            &ctx,
            &signed.signature_base64,
            &signer.public_key(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn signature_cannot_be_replayed_into_another_purpose() {
        let signer = LocalSigner::generate("key-1");
        let payload_hash = crate::hash::sha256_bytes(b"hello");
        let ctx = json!({});

        let signed = signer
            .sign(&payload_hash, SigningPurpose::EventPayload, &ctx)
            .await
            .unwrap();

        let result = verify_envelope(
            &payload_hash,
            SigningPurpose::GovernancePolicy,
            &ctx,
            &signed.signature_base64,
            &signer.public_key(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn signature_cannot_be_replayed_into_another_context() {
        let signer = LocalSigner::generate("key-1");
        let payload_hash = crate::hash::sha256_bytes(b"hello");

        let signed = signer
            .sign(&payload_hash, SigningPurpose::EventPayload, &json!({"a": 1}))
            .await
            .unwrap();

        let result = verify_envelope(
            &payload_hash,
            SigningPurpose::EventPayload,
            &json!({"a": 2}),
            &signed.signature_base64,
            &signer.public_key(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wrong_key_fails_verification() {
        let signer = LocalSigner::generate("key-1");
        let other = LocalSigner::generate("key-2");
        let payload_hash = crate::hash::sha256_bytes(b"hello");
        let ctx = json!({});

        let signed = signer
            .sign(&payload_hash, SigningPurpose::EventPayload, &ctx)
            .await
            .unwrap();

        let result = verify_envelope(
            &payload_hash,
            SigningPurpose::EventPayload,
            &ctx,
            &signed.signature_base64,
            &other.public_key(),
        );
        assert!(result.is_err());
    }
}
