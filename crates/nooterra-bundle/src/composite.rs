//! Composite bundle embedding (spec §4.7): invoice embeds job proof under
//! `payload/job_proof_bundle/`, finance embeds month under `month/`,
//! close-pack embeds invoice under `payload/invoice_bundle/`.

use crate::manifest::BundleFile;

/// Copies every file of an already-built child bundle byte-for-byte under
/// `prefix`, preserving `manifestHash` / `attestationHash` inside the
/// copied files untouched.
pub fn embed_child(child_files: &[BundleFile], prefix: &str) -> Vec<BundleFile> {
    child_files
        .iter()
        .map(|f| BundleFile {
            path: format!("{prefix}/{}", f.path),
            bytes: f.bytes.clone(),
        })
        .collect()
}

pub const JOB_PROOF_EMBED_PREFIX: &str = "payload/job_proof_bundle";
pub const MONTH_PROOF_EMBED_PREFIX: &str = "month";
pub const INVOICE_EMBED_PREFIX: &str = "payload/invoice_bundle";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_preserves_bytes_and_prefixes_path() {
        let child = vec![BundleFile {
            path: "manifest.json".into(),
            bytes: b"{}".to_vec(),
        }];
        let embedded = embed_child(&child, JOB_PROOF_EMBED_PREFIX);
        assert_eq!(embedded[0].path, "payload/job_proof_bundle/manifest.json");
        assert_eq!(embedded[0].bytes, b"{}".to_vec());
    }
}
