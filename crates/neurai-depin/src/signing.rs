//! Message signing seam.
//!
//! Signing is delegated entirely to the caller: the library never touches key
//! material. A wallet, a hardware signer, or a `neurai-cli signmessage`
//! wrapper all plug in through [`MessageSigner`].

use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// Caller-supplied signing capability.
///
/// Implementations must return a non-empty base64 signature for the given
/// message; an empty result fails the call before anything is sent.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign_message(&self, message: &str) -> anyhow::Result<String>;
}

/// Adapter wrapping an async closure as a [`MessageSigner`].
///
/// Convenient for callers that already have a signing function rather than a
/// signer type.
pub struct SignerFn {
    #[allow(clippy::type_complexity)]
    f: Box<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>,
}

impl SignerFn {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            f: Box::new(move |message| Box::pin(f(message))),
        }
    }
}

#[async_trait]
impl MessageSigner for SignerFn {
    async fn sign_message(&self, message: &str) -> anyhow::Result<String> {
        (self.f)(message.to_string()).await
    }
}

impl std::fmt::Debug for SignerFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerFn").finish()
    }
}
