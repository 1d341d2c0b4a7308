//! DePIN RPC client for Neurai.
//!
//! Supports communicating with Neurai DePIN messaging (typically on port
//! 19002) using the challenge/response authentication protocol: the client
//! fetches a short-lived challenge per operation mode, has the caller's
//! signer sign a canonical message, and appends the challenge and signature
//! to every privileged JSON-RPC call. Expired challenges are refreshed and
//! retried once, transparently.
//!
//! ```no_run
//! use neurai_depin::{DepinAuthOptions, DepinClient, SignerFn};
//! use std::sync::Arc;
//!
//! # async fn run() -> neurai_depin::Result<()> {
//! let signer = Arc::new(SignerFn::new(|message: String| async move {
//!     // Sign with your wallet, e.g. `neurai-cli signmessage <addr> <msg>`.
//!     Ok("base64signature==".to_string())
//! }));
//!
//! let client = DepinClient::new(
//!     "http://localhost:19002",
//!     DepinAuthOptions::new("MYTOKEN", "NXmyaddress", signer),
//! )?;
//!
//! let result = client
//!     .call(
//!         "depinsendmsg",
//!         vec![
//!             "MYTOKEN".into(),
//!             "localhost".into(),
//!             "Hello from DePIN!".into(),
//!             "NXmyaddress".into(),
//!         ],
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod client;
pub mod config;
pub mod error;
pub mod signing;
pub mod transport;
pub mod types;

pub use challenge::{request_challenge, ChallengeManager};
pub use client::{request_depin_challenge, DepinClient};
pub use config::DepinConfig;
pub use error::{Error, Result};
pub use signing::{MessageSigner, SignerFn};
pub use transport::{HttpTransport, RpcRequest, RpcResponse, RpcTransport, TransportResponse};
pub use types::{mode_for_method, Challenge, DepinAuthOptions, DepinMode};
