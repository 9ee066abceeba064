//! Request timestamp and password derivation
//!
//! The broker recomputes the password from the same short code, passkey and
//! timestamp to authenticate a request, and rejects stale timestamps. The
//! payload's `Timestamp` field and the password derivation must therefore use
//! the same value, so both are generated together in one envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Local;

/// Current local time as 14 zero-padded digits, `YYYYMMDDHHmmss`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Base64 of the byte concatenation `short_code || passkey || timestamp`,
/// no delimiter.
pub fn password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{short_code}{passkey}{timestamp}"))
}

/// One timestamp and the password derived from it, created immediately
/// before an outbound request and discarded after use.
pub struct SignedEnvelope {
    pub timestamp: String,
    pub password: String,
}

impl SignedEnvelope {
    pub fn generate(short_code: &str, passkey: &str) -> Self {
        let timestamp = timestamp();
        let password = password(short_code, passkey, &timestamp);
        Self {
            timestamp,
            password,
        }
    }
}
