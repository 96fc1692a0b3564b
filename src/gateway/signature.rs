//! Webhook signature validation.
//!
//! The gateway signs the raw request body with HMAC-SHA512 keyed by the
//! account secret and sends the hex digest in a header. Validation recomputes
//! the digest and compares in constant time; a mismatch is a boolean result,
//! never an error.

pub fn validate_webhook(secret: &str, signature: &str, payload: &[u8]) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    type HmacSha512 = Hmac<Sha512>;
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
