//! Request signatures
//!
//! Every request body is signed with HMAC-SHA1. The key is not the shared
//! secret itself: the secret is XORed byte-wise with the decimal ASCII
//! rendering of the body length, repeated as often as needed. The base64
//! encoded digest goes into the `Authorization` header.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Derives the per-request HMAC key from the secret and the body length
pub fn derive_key(secret: &[u8], body_len: usize) -> Vec<u8> {
    let stream = body_len.to_string().into_bytes();
    secret
        .iter()
        .zip(stream.iter().cycle())
        .map(|(s, k)| s ^ k)
        .collect()
}

/// Computes the `Authorization` header value for `body`
///
/// Returns an empty string when no secret is known yet.
pub fn sign(secret: Option<&str>, body: &[u8]) -> String {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let key = derive_key(secret.as_bytes(), body.len());
    // HMAC accepts keys of any length
    let mut mac = match HmacSha1::new_from_slice(&key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
