//! Reason-code normalization (spec §4.5, §8).
//!
//! Both the x402 verify operation and any downstream gateway adapter MUST
//! reproduce this exact function so gateway headers match decision records
//! bit-for-bit. It lives in `nooterra-types` (rather than `nooterra-x402`)
//! precisely so an adapter crate can depend on it without pulling in the
//! gate state machine.

/// `trim + uppercase` every code, drop empties, dedupe preserving the first
/// occurrence, in order.
pub fn normalize_reason_codes<I, S>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for code in codes {
        let cleaned = code.as_ref().trim().to_uppercase();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            out.push(cleaned);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let once = normalize_reason_codes([
            "  X402_PROVIDER_SIGNATURE_INVALID  ",
            "POLICY_ALLOW",
            "X402_PROVIDER_SIGNATURE_INVALID",
            "BETA",
        ]);
        let twice = normalize_reason_codes(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn spec_scenario_6() {
        let a = normalize_reason_codes([
            "  X402_PROVIDER_SIGNATURE_INVALID  ",
            "POLICY_ALLOW",
            "X402_PROVIDER_SIGNATURE_INVALID",
            "BETA",
        ]);
        let b = normalize_reason_codes(["ALPHA", "POLICY_ALLOW", "ALPHA", "", "BETA"]);
        let mut combined = a;
        combined.extend(normalize_reason_codes(b));
        // The two inputs are normalized independently per the scenario, but
        // a caller merging both lists (e.g. gateway + wallet decision) still
        // dedupes across the concatenation, first occurrence wins.
        let merged = normalize_reason_codes(combined);
        assert_eq!(
            merged,
            vec!["X402_PROVIDER_SIGNATURE_INVALID", "POLICY_ALLOW", "BETA", "ALPHA"]
        );
    }

    #[test]
    fn drops_blank_after_trim() {
        assert_eq!(normalize_reason_codes(["   ", "ok"]), vec!["OK"]);
    }
}
