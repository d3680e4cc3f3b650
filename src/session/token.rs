//! Local inspection of backend-issued session tokens.
//!
//! Tokens are JWT-shaped; only the backend can verify the signature. The
//! expiry check here reads the `exp` claim straight out of the payload so an
//! obviously stale session can be rejected without a network round trip. It
//! never establishes identity on its own: live sessions are still confirmed
//! against the backend by the gate.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims read from the token payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Expiration, unix seconds.
    pub exp: i64,
}

/// Decode the payload segment of a token without verifying it.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload.
#[must_use]
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let raw = Base64UrlUnpadded::decode_vec(payload).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Whether the token is expired at `now` (unix seconds).
///
/// Tokens whose claims cannot be decoded count as expired.
#[must_use]
pub fn is_expired(token: &str, now: i64) -> bool {
    decode_claims(token).map_or(true, |claims| claims.exp <= now)
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
