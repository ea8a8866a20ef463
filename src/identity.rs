//! Anonymized identifiers stored in place of raw client data.
//!
//! The ledger never sees an IP address or user agent in clear text; callers
//! hash them here and store the 64-character hex digests.

use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable pseudonymous user id derived from client address and user agent.
pub fn anonymize_user(ip: Option<&str>, user_agent: Option<&str>) -> String {
    let ip = ip.unwrap_or("unknown");
    let user_agent = user_agent.unwrap_or("unknown");
    sha256_hex(&format!("{ip}:{user_agent}"))
}

/// Hash of the client address for the `ip_address_hash` column.
pub fn hash_ip(ip: &str) -> String {
    sha256_hex(ip)
}
