//! Nooterra Crypto - canonical JSON, hashing, and purpose-bound Ed25519
//! signing (spec C1 / §4.1).

pub mod canonical;
pub mod error;
pub mod hash;
pub mod keys;
pub mod signer;

pub use canonical::{canonicalize, canonicalize_value, CanonicalizeError};
pub use error::{CryptoError, SignatureError, VerifyError, VerifyReasonCode};
pub use hash::{sha256_bytes, sha256_hex, sha256_of_json, sha256_of_value};
pub use keys::{KeyPair, PublicKey};
pub use signer::{verify_envelope, LocalSigner, SignedEnvelope, Signer, SigningPurpose};
