//! Slack request signature verification (HMAC-SHA256, `v0` scheme).

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::utilities::errors::{ServiceError, ServiceResult};

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Requests older (or newer) than this are rejected as replays.
pub const MAX_TIMESTAMP_AGE_SECS: u64 = 300;

fn signing_mac(signing_secret: &str, timestamp: &str, body: &[u8]) -> ServiceResult<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| ServiceError::internal(format!("HMAC key error: {}", e)))?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

/// `v0=` followed by the hex HMAC-SHA256 of `v0:{timestamp}:{body}`.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> ServiceResult<String> {
    let mac = signing_mac(signing_secret, timestamp, body)?;
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verify a request against the signing secret at time `now_secs`.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_secs: u64,
) -> ServiceResult<()> {
    let ts: u64 = timestamp
        .parse()
        .map_err(|_| ServiceError::unauthorized("invalid Slack request timestamp"))?;

    if now_secs.abs_diff(ts) > MAX_TIMESTAMP_AGE_SECS {
        log::warn!(
            "Slack request timestamp {} too far from now {} (possible replay)",
            ts,
            now_secs
        );
        return Err(ServiceError::unauthorized("Slack request timestamp is stale"));
    }

    let decoded = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or_else(|| ServiceError::unauthorized("malformed Slack request signature"))?;
    signing_mac(signing_secret, timestamp, body)?
        .verify_slice(&decoded)
        .map_err(|_| {
            log::warn!("Slack signature verification failed");
            ServiceError::unauthorized("invalid Slack request signature")
        })
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
