//! Demo of the DePIN client against a local Neurai node.
//!
//! Requires a running node with DePIN enabled, a valid token, and a real
//! signer. The mock signer below only exercises the request path; the node
//! will reject its signature.
//!
//! Run with: `cargo run --example depin_demo`

use neurai_depin::{request_depin_challenge, DepinAuthOptions, DepinClient, DepinMode, SignerFn};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,neurai_depin=debug".into()),
        )
        .init();

    let url = std::env::var("NEURAI_DEPIN_URL").unwrap_or_else(|_| "http://localhost:19002".into());

    let signer = Arc::new(SignerFn::new(|message: String| async move {
        info!(%message, "mock-signing message");
        Ok("H1234567890abcdef1234567890abcdef1234567890abcdef==".to_string())
    }));

    let options = DepinAuthOptions::new("TESTTOKEN", "NXtestAddress123", signer)
        .with_mode(DepinMode::Send);

    match request_depin_challenge(&url, &options).await {
        Ok(challenge) => {
            info!(
                challenge = %challenge.challenge,
                timeout = challenge.timeout,
                message_to_sign = %challenge.message_to_sign,
                "challenge received"
            );
        }
        Err(e) => warn!(error = %e, "challenge request failed"),
    }

    let client = DepinClient::new(&url, options)?;
    match client
        .call(
            "depinsendmsg",
            vec![
                "TESTTOKEN".into(),
                "localhost".into(),
                "Hello from DePIN!".into(),
                "NXtestAddress123".into(),
            ],
        )
        .await
    {
        Ok(result) => info!(%result, "message sent"),
        Err(e) => warn!(error = %e, "send failed (expected with the mock signer)"),
    }

    Ok(())
}
