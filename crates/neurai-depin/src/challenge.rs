//! Challenge acquisition and caching.
//!
//! The DePIN server hands out short-lived challenges per operation mode via a
//! plain-text handshake (`AUTH|token|address|mode` →
//! `CHALLENGE|challenge|timeoutSeconds`). [`ChallengeManager`] keeps at most
//! one challenge cached and refreshes it when the mode changes or the
//! validity window runs out.

use crate::transport::RpcTransport;
use crate::types::{message_to_sign, Challenge, DepinMode};
use crate::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Seconds subtracted from the server-declared timeout so a challenge is
/// never used right at the edge of the server's own expiry.
const EXPIRY_MARGIN_SECS: i64 = 5;

#[derive(Debug, Clone)]
struct CachedChallenge {
    challenge: String,
    expires_at: Instant,
    mode: DepinMode,
}

/// Obtains, caches, and expires authentication challenges.
///
/// Holds a single cache slot that is replaced wholesale on refresh. Stale or
/// wrong-mode entries are simply overwritten; a failed fetch leaves the slot
/// untouched.
pub struct ChallengeManager {
    token: String,
    address: String,
    cache: Mutex<Option<CachedChallenge>>,
}

impl ChallengeManager {
    pub fn new(token: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            address: address.into(),
            cache: Mutex::new(None),
        }
    }

    /// Return a challenge valid for `mode`, fetching a fresh one if the
    /// cached entry is missing, stale, or was issued for another mode.
    ///
    /// The cache hit path performs no network I/O.
    pub async fn ensure_valid(
        &self,
        transport: &dyn RpcTransport,
        mode: DepinMode,
    ) -> Result<String> {
        if let Some(challenge) = self.cached(mode) {
            debug!(%mode, "using cached challenge");
            return Ok(challenge);
        }

        let fresh = request_challenge(transport, &self.token, &self.address, mode).await?;
        let expires_at = expiry_instant(Instant::now(), fresh.timeout);

        debug!(%mode, timeout = fresh.timeout, "caching fresh challenge");
        *self.cache.lock().unwrap() = Some(CachedChallenge {
            challenge: fresh.challenge.clone(),
            expires_at,
            mode,
        });

        Ok(fresh.challenge)
    }

    /// Drop the cached challenge, forcing the next call to fetch a new one.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap() = None;
    }

    fn cached(&self, mode: DepinMode) -> Option<String> {
        let cache = self.cache.lock().unwrap();
        match cache.as_ref() {
            Some(entry) if entry.mode == mode && Instant::now() < entry.expires_at => {
                Some(entry.challenge.clone())
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for ChallengeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeManager")
            .field("token", &self.token)
            .field("address", &self.address)
            .finish()
    }
}

/// Absolute expiry for a challenge issued at `now`.
///
/// A server timeout of `EXPIRY_MARGIN_SECS` or less yields an entry that is
/// already stale on the next check. That is legal, not an error: the next
/// call just fetches again.
fn expiry_instant(now: Instant, timeout_secs: i64) -> Instant {
    let effective = timeout_secs.saturating_sub(EXPIRY_MARGIN_SECS).max(0) as u64;
    now + Duration::from_secs(effective)
}

/// Request a fresh challenge from the server, without caching.
///
/// Sends the `AUTH|token|address|mode` command and parses the
/// `CHALLENGE|challenge|timeoutSeconds` reply.
pub async fn request_challenge(
    transport: &dyn RpcTransport,
    token: &str,
    address: &str,
    mode: DepinMode,
) -> Result<Challenge> {
    let auth_command = format!("AUTH|{}|{}|{}", token, address, mode);

    let response = transport
        .post_text(&auth_command)
        .await
        .map_err(|e| Error::Challenge {
            message: format!("Failed to request DePIN challenge: {}", e),
        })?;

    if !response.is_success() {
        return Err(Error::Challenge {
            message: format!(
                "Failed to request challenge: {} {}",
                response.status, response.status_text
            ),
        });
    }

    parse_challenge_response(&response.body, mode, token, address)
}

fn parse_challenge_response(
    body: &str,
    mode: DepinMode,
    token: &str,
    address: &str,
) -> Result<Challenge> {
    let text = body.trim_end();

    if !text.starts_with("CHALLENGE|") {
        return Err(Error::Challenge {
            message: format!("Invalid challenge response: {}", text),
        });
    }

    let parts: Vec<&str> = text.split('|').collect();
    if parts.len() < 3 {
        return Err(Error::Challenge {
            message: format!("Malformed challenge response: {}", text),
        });
    }

    let challenge = parts[1];
    if challenge.is_empty() {
        return Err(Error::Challenge {
            message: format!("Invalid challenge data: {}", text),
        });
    }

    let timeout: i64 = parts[2].parse().map_err(|_| Error::Challenge {
        message: format!("Invalid challenge data: {}", text),
    })?;

    Ok(Challenge {
        challenge: challenge.to_string(),
        timeout,
        message_to_sign: message_to_sign(mode, token, address, challenge),
    })
}
