//! Authenticated DePIN call dispatcher.
//!
//! Orchestrates a full privileged call: obtain a challenge for the method's
//! mode, sign the canonical message, append `[challenge, signature]` to the
//! params, send the JSON-RPC envelope, and classify the reply. The one
//! recoverable failure is a challenge the server reports as expired, which is
//! retried exactly once with a cleared cache.

use crate::challenge::{self, ChallengeManager};
use crate::config::DepinConfig;
use crate::signing::MessageSigner;
use crate::transport::{HttpTransport, RpcRequest, RpcResponse, RpcTransport, TransportResponse};
use crate::types::{message_to_sign, mode_for_method, Challenge, DepinAuthOptions, DepinMode};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

const COMMUNICATION_HINT: &str =
    "Check that the DePIN server URL is correct and that the server is running";

/// Client for authenticated DePIN JSON-RPC calls.
///
/// One client holds one [`ChallengeManager`] cache slot; nothing is shared
/// across client instances and nothing persists across restarts.
pub struct DepinClient {
    transport: Arc<dyn RpcTransport>,
    options: DepinAuthOptions,
    challenges: ChallengeManager,
}

impl DepinClient {
    /// Create a client for the given DePIN server URL.
    ///
    /// Fails fast with [`Error::Config`] if the URL does not parse or the
    /// token or address is empty.
    pub fn new(url: &str, options: DepinAuthOptions) -> Result<Self> {
        let transport = HttpTransport::new(url)?;
        Self::with_transport(Arc::new(transport), options)
    }

    /// Create a client over an existing transport.
    ///
    /// This is the seam used by tests and by callers that already manage
    /// their own HTTP stack.
    pub fn with_transport(
        transport: Arc<dyn RpcTransport>,
        options: DepinAuthOptions,
    ) -> Result<Self> {
        if options.token.is_empty() {
            return Err(Error::Config {
                message: "Token is required for DePIN authentication".to_string(),
            });
        }
        if options.address.is_empty() {
            return Err(Error::Config {
                message: "Address is required for DePIN authentication".to_string(),
            });
        }

        let challenges = ChallengeManager::new(options.token.clone(), options.address.clone());

        Ok(Self {
            transport,
            options,
            challenges,
        })
    }

    /// Create a client from environment-derived configuration and a signer.
    pub fn from_config(config: &DepinConfig, signer: Arc<dyn MessageSigner>) -> Result<Self> {
        let options = DepinAuthOptions::new(config.token.clone(), config.address.clone(), signer)
            .with_mode(config.mode);
        Self::new(&config.url, options)
    }

    /// Issue an authenticated JSON-RPC call.
    ///
    /// The operation mode is inferred from the method name; callers never
    /// pass challenges or signatures themselves.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mode = mode_for_method(method);
        let mut retried = false;

        // Bounded retry: one extra attempt when the server rejects the
        // challenge as expired. A second expiry propagates as a plain RPC
        // error.
        loop {
            match self.call_once(method, &params, mode).await {
                Err(e) if e.is_expired_challenge() && !retried => {
                    warn!(method, "challenge expired, refetching and retrying");
                    self.challenges.invalidate();
                    retried = true;
                }
                other => return other,
            }
        }
    }

    async fn call_once(
        &self,
        method: &str,
        params: &[serde_json::Value],
        mode: DepinMode,
    ) -> Result<serde_json::Value> {
        let challenge = self
            .challenges
            .ensure_valid(self.transport.as_ref(), mode)
            .await?;

        let message = message_to_sign(mode, &self.options.token, &self.options.address, &challenge);

        let signature = self
            .options
            .signer
            .sign_message(&message)
            .await
            .map_err(|e| Error::Communication {
                message: format!("Signing failed: {}", e),
                hint: COMMUNICATION_HINT.to_string(),
            })?;

        if signature.is_empty() {
            return Err(Error::Signing {
                message: "Signature function returned empty result".to_string(),
            });
        }

        let mut enhanced = params.to_vec();
        enhanced.push(serde_json::Value::String(challenge));
        enhanced.push(serde_json::Value::String(signature));

        let request = RpcRequest::new(method, enhanced);
        debug!(method, id = request.id, %mode, "sending authenticated call");

        let response = self
            .transport
            .post_rpc(&request)
            .await
            .map_err(|e| match e {
                Error::Http(_) => Error::Communication {
                    message: format!("Failed to communicate with DePIN server: {}", e),
                    hint: COMMUNICATION_HINT.to_string(),
                },
                other => other,
            })?;

        classify_response(response)
    }
}

impl std::fmt::Debug for DepinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepinClient")
            .field("options", &self.options)
            .finish()
    }
}

/// Map a raw transport response to a result or a structured error.
fn classify_response(response: TransportResponse) -> Result<serde_json::Value> {
    if !response.is_success() {
        // Best-effort parse of the error body for a server message.
        let message = serde_json::from_str::<RpcResponse>(&response.body)
            .ok()
            .and_then(|r| r.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Request failed".to_string());

        return Err(Error::Transport {
            status: response.status,
            status_text: response.status_text,
            message,
        });
    }

    let parsed: RpcResponse =
        serde_json::from_str(&response.body).map_err(|e| Error::Communication {
            message: format!("Invalid JSON-RPC response: {}", e),
            hint: COMMUNICATION_HINT.to_string(),
        })?;

    if let Some(error) = parsed.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message.unwrap_or_else(|| "Unknown error".to_string()),
            data: error.data,
        });
    }

    Ok(parsed.result.unwrap_or(serde_json::Value::Null))
}

/// One-off challenge fetch without constructing a full client.
///
/// Useful for testing a server or for manual challenge handling; the returned
/// [`Challenge`] carries the raw challenge, its timeout, and the message that
/// needs to be signed. Nothing is cached.
pub async fn request_depin_challenge(url: &str, options: &DepinAuthOptions) -> Result<Challenge> {
    let transport = HttpTransport::new(url)?;
    challenge::request_challenge(&transport, &options.token, &options.address, options.mode).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SignerFn;
    use crate::transport::MockRpcTransport;
    use serde_json::json;

    fn ok_text(body: &str) -> crate::transport::TransportResponse {
        TransportResponse {
            status: 200,
            status_text: "OK".to_string(),
            body: body.to_string(),
        }
    }

    fn test_signer() -> Arc<dyn MessageSigner> {
        Arc::new(SignerFn::new(|message: String| async move {
            Ok(format!("sig({})", message))
        }))
    }

    fn empty_signer() -> Arc<dyn MessageSigner> {
        Arc::new(SignerFn::new(|_message: String| async move {
            Ok(String::new())
        }))
    }

    fn client_with(transport: MockRpcTransport, signer: Arc<dyn MessageSigner>) -> DepinClient {
        let options = DepinAuthOptions::new("MYTOKEN", "NXaddr", signer);
        DepinClient::with_transport(Arc::new(transport), options).unwrap()
    }

    #[test]
    fn test_construction_requires_token_and_address() {
        let err =
            DepinClient::new("http://localhost:19002", DepinAuthOptions::new("", "NXaddr", test_signer()))
                .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err =
            DepinClient::new("http://localhost:19002", DepinAuthOptions::new("T", "", test_signer()))
                .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = DepinClient::new("", DepinAuthOptions::new("T", "A", test_signer())).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_call_appends_challenge_and_signature_in_order() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .withf(|body| body == "AUTH|MYTOKEN|NXaddr|RECEIVE")
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|abc123|60")));
        transport
            .expect_post_rpc()
            .withf(|request| {
                request.method == "depingetmsg"
                    && request.params
                        == vec![
                            json!("MYTOKEN"),
                            json!("abc123"),
                            json!("sig(DEPIN-RECEIVE|MYTOKEN|NXaddr|abc123)"),
                        ]
            })
            .times(1)
            .returning(|_| Ok(ok_text(r#"{"result":{"messages":[]},"error":null}"#)));

        let client = client_with(transport, test_signer());
        let result = client.call("depingetmsg", vec![json!("MYTOKEN")]).await.unwrap();

        assert_eq!(result, json!({"messages": []}));
    }

    #[tokio::test]
    async fn test_send_methods_use_send_mode() {
        for method in ["depinsendmsg", "depinsubmitmsg"] {
            let mut transport = MockRpcTransport::new();
            transport
                .expect_post_text()
                .withf(|body| body == "AUTH|MYTOKEN|NXaddr|SEND")
                .times(1)
                .returning(|_| Ok(ok_text("CHALLENGE|c1|60")));
            transport
                .expect_post_rpc()
                .times(1)
                .returning(|_| Ok(ok_text(r#"{"result":"ok"}"#)));

            let client = client_with(transport, test_signer());
            let result = client.call(method, vec![json!("p")]).await.unwrap();
            assert_eq!(result, json!("ok"));
        }
    }

    #[tokio::test]
    async fn test_empty_signature_fails_before_send() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|abc|60")));
        // No post_rpc expectation: the call must fail before any RPC send.

        let client = client_with(transport, empty_signer());
        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Signing { .. }));
    }

    #[tokio::test]
    async fn test_expired_challenge_retries_once_with_fresh_challenge() {
        let mut transport = MockRpcTransport::new();
        // First challenge, rejected as expired by the server.
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|stale|60")));
        transport
            .expect_post_rpc()
            .withf(|request| request.params.contains(&json!("stale")))
            .times(1)
            .returning(|_| {
                Ok(ok_text(
                    r#"{"error":{"code":-32000,"message":"Challenge expired"}}"#,
                ))
            });
        // Retry path: cache was cleared, a fresh challenge is fetched.
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|fresh|60")));
        transport
            .expect_post_rpc()
            .withf(|request| request.params.contains(&json!("fresh")))
            .times(1)
            .returning(|_| Ok(ok_text(r#"{"result":42}"#)));

        let client = client_with(transport, test_signer());
        let result = client.call("depingetmsg", vec![]).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn test_second_expiry_propagates_as_rpc_error() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(2)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));
        transport
            .expect_post_rpc()
            .times(2)
            .returning(|_| {
                Ok(ok_text(
                    r#"{"error":{"code":-32000,"message":"Challenge expired"}}"#,
                ))
            });

        let client = client_with(transport, test_signer());
        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Rpc { .. }));
        assert!(err.is_expired_challenge());
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces_with_payload() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));
        transport
            .expect_post_rpc()
            .times(1)
            .returning(|_| {
                Ok(ok_text(
                    r#"{"error":{"code":-8,"message":"Invalid token","data":{"token":"X"}}}"#,
                ))
            });

        let client = client_with(transport, test_signer());
        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        match err {
            Error::Rpc {
                code,
                message,
                data,
            } => {
                assert_eq!(code, Some(-8));
                assert_eq!(message, "Invalid token");
                assert_eq!(data, Some(json!({"token": "X"})));
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_failure_becomes_transport_error() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));
        transport.expect_post_rpc().times(1).returning(|_| {
            Ok(TransportResponse {
                status: 403,
                status_text: "Forbidden".to_string(),
                body: r#"{"error":{"message":"Not authorized"}}"#.to_string(),
            })
        });

        let client = client_with(transport, test_signer());
        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        match err {
            Error::Transport {
                status,
                status_text,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(status_text, "Forbidden");
                assert_eq!(message, "Not authorized");
            }
            other => panic!("expected Transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signer_failure_becomes_communication_error() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));

        let failing = Arc::new(SignerFn::new(|_message: String| async move {
            Err::<String, anyhow::Error>(anyhow::anyhow!("wallet locked"))
        }));
        let client = client_with(transport, failing);

        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Communication { .. }));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_communication_error() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));
        transport
            .expect_post_rpc()
            .times(1)
            .returning(|_| Ok(ok_text("<html>proxy error</html>")));

        let client = client_with(transport, test_signer());
        let err = client.call("depingetmsg", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Communication { .. }));
    }

    #[tokio::test]
    async fn test_missing_result_resolves_to_null() {
        let mut transport = MockRpcTransport::new();
        transport
            .expect_post_text()
            .times(1)
            .returning(|_| Ok(ok_text("CHALLENGE|c|60")));
        transport
            .expect_post_rpc()
            .times(1)
            .returning(|_| Ok(ok_text(r#"{"error":null}"#)));

        let client = client_with(transport, test_signer());
        let result = client.call("depingetmsg", vec![]).await.unwrap();
        assert_eq!(result, serde_json::Value::Null);
    }
}
