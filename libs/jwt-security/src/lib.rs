//! Token revocation support for JWT-based sessions.
//!
//! Revoked tokens are tracked by their `jti` claim until their natural
//! expiry; storage prefers a durable keyed-expiry backend and degrades to an
//! in-process map when that backend is unreachable.

use anyhow::{Context, Result};

mod token_revocation;

pub use token_revocation::{
    LedgerStats, RevokedEntry, TokenClass, TokenRevocationLedger, USER_REVOCATION_TTL,
};

/// Extract the `jti` claim from a compact JWT without validating it.
///
/// Only the payload section is parsed; signature checks belong to the auth
/// middleware upstream.
pub fn extract_jti(token: &str) -> Result<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow::anyhow!("invalid JWT format"));
    }

    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .context("failed to decode JWT payload")?;

    let claims: serde_json::Value =
        serde_json::from_slice(&payload).context("failed to parse JWT claims")?;

    claims
        .get("jti")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing jti in token"))
}
