//! HMAC-SHA256 signatures as used by the payment provider.
//!
//! Signatures travel as lowercase hex. Comparison decodes the provided
//! value and checks it in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn digest(secret: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Signs `payload` with `secret`, returning the hex-encoded MAC.
pub fn sign(secret: &[u8], payload: &[u8]) -> Option<String> {
    digest(secret, payload).map(hex::encode)
}

/// Returns true if `signature` is the hex HMAC of `payload` under `secret`.
///
/// An empty secret never verifies.
pub fn verify(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let Some(expected) = digest(secret, payload) else {
        return false;
    };
    expected.ct_eq(&provided).into()
}

/// The payload signed for a checkout callback: `order_id|payment_id`.
pub fn payment_payload(gateway_order_id: &str, payment_id: &str) -> String {
    format!("{gateway_order_id}|{payment_id}")
}
