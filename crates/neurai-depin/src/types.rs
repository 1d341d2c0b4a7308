//! Core types for DePIN challenge/response authentication.

use crate::signing::MessageSigner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// DePIN operation mode.
///
/// Challenges are scoped per mode: a challenge issued for `Send` does not
/// authorize `Receive` calls and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepinMode {
    Send,
    #[default]
    Receive,
}

impl fmt::Display for DepinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepinMode::Send => write!(f, "SEND"),
            DepinMode::Receive => write!(f, "RECEIVE"),
        }
    }
}

impl FromStr for DepinMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SEND" => Ok(DepinMode::Send),
            "RECEIVE" => Ok(DepinMode::Receive),
            other => Err(format!("unknown DePIN mode: {}", other)),
        }
    }
}

/// Infer the operation mode from an RPC method name.
///
/// `depinsendmsg` and `depinsubmitmsg` are the only methods that require a
/// SEND challenge; every other method authenticates with RECEIVE.
pub fn mode_for_method(method: &str) -> DepinMode {
    match method {
        "depinsendmsg" | "depinsubmitmsg" => DepinMode::Send,
        _ => DepinMode::Receive,
    }
}

/// Build the canonical message a signer must sign to prove ownership of the
/// address for a given challenge.
pub(crate) fn message_to_sign(
    mode: DepinMode,
    token: &str,
    address: &str,
    challenge: &str,
) -> String {
    format!("DEPIN-{}|{}|{}|{}", mode, token, address, challenge)
}

/// Authentication options for a DePIN client.
#[derive(Clone)]
pub struct DepinAuthOptions {
    /// DePIN token name (e.g. "MYTOKEN").
    pub token: String,
    /// Neurai address that signs challenges.
    pub address: String,
    /// Caller-supplied signing capability (must return a base64 signature).
    pub signer: Arc<dyn MessageSigner>,
    /// Default operation mode for standalone challenge requests.
    pub mode: DepinMode,
}

impl DepinAuthOptions {
    pub fn new(
        token: impl Into<String>,
        address: impl Into<String>,
        signer: Arc<dyn MessageSigner>,
    ) -> Self {
        Self {
            token: token.into(),
            address: address.into(),
            signer,
            mode: DepinMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: DepinMode) -> Self {
        self.mode = mode;
        self
    }
}

impl fmt::Debug for DepinAuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepinAuthOptions")
            .field("token", &self.token)
            .field("address", &self.address)
            .field("mode", &self.mode)
            .finish()
    }
}

/// A challenge issued by the DePIN server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Opaque challenge string from the server.
    pub challenge: String,
    /// Server-declared validity window in seconds.
    pub timeout: i64,
    /// Complete message that needs to be signed.
    pub message_to_sign: String,
}
