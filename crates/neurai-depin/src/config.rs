//! Environment-based configuration.

use crate::types::DepinMode;
use crate::{Error, Result};
use std::env;

/// Connection settings for a DePIN client, loadable from the environment.
///
/// The signing capability cannot come from the environment; pair a loaded
/// config with a signer via `DepinClient::from_config`.
#[derive(Debug, Clone)]
pub struct DepinConfig {
    /// DePIN server URL (e.g. "http://localhost:19002").
    pub url: String,
    /// DePIN token name.
    pub token: String,
    /// Neurai address that signs challenges.
    pub address: String,
    /// Default operation mode for standalone challenge requests.
    pub mode: DepinMode,
}

impl DepinConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `NEURAI_DEPIN_URL`, `NEURAI_DEPIN_TOKEN`, `NEURAI_DEPIN_ADDRESS`
    /// and optionally `NEURAI_DEPIN_MODE` ("SEND" or "RECEIVE", default
    /// RECEIVE). A `.env` file is honored when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("NEURAI_DEPIN_URL").map_err(|_| Error::Config {
            message: "NEURAI_DEPIN_URL environment variable not set".to_string(),
        })?;
        let token = env::var("NEURAI_DEPIN_TOKEN").map_err(|_| Error::Config {
            message: "NEURAI_DEPIN_TOKEN environment variable not set".to_string(),
        })?;
        let address = env::var("NEURAI_DEPIN_ADDRESS").map_err(|_| Error::Config {
            message: "NEURAI_DEPIN_ADDRESS environment variable not set".to_string(),
        })?;

        let mode = match env::var("NEURAI_DEPIN_MODE") {
            Ok(raw) => raw.parse().map_err(|e| Error::Config {
                message: format!("Invalid NEURAI_DEPIN_MODE: {}", e),
            })?,
            Err(_) => DepinMode::default(),
        };

        Ok(Self {
            url,
            token,
            address,
            mode,
        })
    }
}
