//! Payment confirmation signatures.
//!
//! `signature = hex(sha256("<outSum>:<orderId>:<secret>"))`, compared
//! case-insensitively.

use sha2::{Digest, Sha256};

/// Compute the expected signature.
pub fn sign(out_sum: &str, order_id: u64, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{out_sum}:{order_id}:{secret}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a received signature.
pub fn verify(out_sum: &str, order_id: u64, secret: &str, signature: &str) -> bool {
    let expected = sign(out_sum, order_id, secret);
    let received = signature.trim().to_ascii_lowercase();

    // Constant-time comparison
    expected.len() == received.len()
        && expected
            .bytes()
            .zip(received.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Parse an amount like `150`, `150.0` or `150.000000` into whole units.
pub fn parse_amount(out_sum: &str) -> Option<u32> {
    let (units, fraction) = match out_sum.trim().split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (out_sum.trim(), ""),
    };
    if !fraction.chars().all(|c| c == '0') {
        return None;
    }
    units.parse().ok()
}
