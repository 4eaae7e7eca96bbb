//! The two-step OAuth provider capability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::OAuthConfig;
use crate::pool::{BackendError, FunctionCall, WorkerPool};

/// Bound on each provider worker call.
pub const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("unexpected worker error: url is not string, url is {0}")]
    InvalidLoginUrl(Value),
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Tag stored as the session payload `source`.
    fn login_type(&self) -> &str;

    fn login_endpoint(&self) -> &str;

    fn callback_endpoint(&self) -> &str;

    /// Consent URL for a login whose callback lands on `host`.
    async fn construct_login_url(&self, host: &str) -> Result<String, ProviderError>;

    /// Resolve the authenticated user from the callback request URL.
    async fn resolve_user(&self, host: &str, request_url: &str) -> Result<Value, ProviderError>;
}

/// Delegates both steps to a worker service:
/// `constructOAuthUrl(host, callbackEndpoint)` and
/// `getUserInfo(host, requestUrl, callbackEndpoint)`.
pub struct WorkerOAuthProvider {
    pool: Arc<dyn WorkerPool>,
    config: OAuthConfig,
}

impl WorkerOAuthProvider {
    pub fn new(pool: Arc<dyn WorkerPool>, config: OAuthConfig) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl OAuthProvider for WorkerOAuthProvider {
    fn login_type(&self) -> &str {
        &self.config.login_type
    }

    fn login_endpoint(&self) -> &str {
        &self.config.login_endpoint
    }

    fn callback_endpoint(&self) -> &str {
        &self.config.callback_endpoint
    }

    async fn construct_login_url(&self, host: &str) -> Result<String, ProviderError> {
        let call = FunctionCall::new(
            "constructOAuthUrl",
            vec![json!(host), json!(self.config.callback_endpoint)],
        );
        match self
            .pool
            .call(&self.config.service_name, call, PROVIDER_CALL_TIMEOUT)
            .await?
        {
            Value::String(url) => Ok(url),
            other => Err(ProviderError::InvalidLoginUrl(other)),
        }
    }

    async fn resolve_user(&self, host: &str, request_url: &str) -> Result<Value, ProviderError> {
        let call = FunctionCall::new(
            "getUserInfo",
            vec![json!(host), json!(request_url), json!(self.config.callback_endpoint)],
        );
        Ok(self
            .pool
            .call(&self.config.service_name, call, PROVIDER_CALL_TIMEOUT)
            .await?)
    }
}
