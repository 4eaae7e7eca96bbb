//! Identity resolution from the session cookie.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::WorkerFunctionConfig;
use crate::pool::{BackendError, FunctionCall, WorkerPool};
use crate::session::{CodecError, SessionCookies};

/// The logged-in caller, as returned by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Value);

impl Identity {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// String identifier used for admin membership.
    ///
    /// A bare string or number is its own id; an object uses `id`, then `uid`.
    pub fn id(&self) -> Option<String> {
        fn scalar(v: &Value) -> Option<String> {
            match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }

        match &self.0 {
            Value::Object(map) => map.get("id").or_else(|| map.get("uid")).and_then(scalar),
            other => scalar(other),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("session resolved to an empty identity")]
    Empty,
}

/// Turns the raw cookie value into an identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, session_text: &str, timeout: Duration) -> Result<Identity, IdentityError>;
}

/// Decrypts the cookie locally; the identity is the payload's `user`.
#[derive(Debug, Clone)]
pub struct CodecIdentityResolver {
    sessions: Arc<SessionCookies>,
}

impl CodecIdentityResolver {
    pub fn new(sessions: Arc<SessionCookies>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl IdentityResolver for CodecIdentityResolver {
    async fn resolve(&self, session_text: &str, _timeout: Duration) -> Result<Identity, IdentityError> {
        let payload = self.sessions.open_payload(session_text)?;
        if payload.user.is_null() {
            return Err(IdentityError::Empty);
        }
        Ok(Identity::new(payload.user))
    }
}

/// Asks a session worker to resolve the cookie text.
///
/// Called as `function(sessionText, timeoutSeconds)`.
pub struct WorkerIdentityResolver {
    pool: Arc<dyn WorkerPool>,
    target: WorkerFunctionConfig,
}

impl WorkerIdentityResolver {
    pub fn new(pool: Arc<dyn WorkerPool>, target: WorkerFunctionConfig) -> Self {
        Self { pool, target }
    }
}

#[async_trait]
impl IdentityResolver for WorkerIdentityResolver {
    async fn resolve(&self, session_text: &str, timeout: Duration) -> Result<Identity, IdentityError> {
        let call = FunctionCall::new(
            self.target.function.clone(),
            vec![json!(session_text), json!(timeout.as_secs())],
        );
        let value = self.pool.call(&self.target.service, call, timeout).await?;
        if value.is_null() {
            return Err(IdentityError::Empty);
        }
        Ok(Identity::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::pool::EventStream;
    use crate::session::{SessionCodec, SessionPayload};
    use std::sync::Mutex;

    #[test]
    fn test_identity_id() {
        assert_eq!(Identity::new(json!("u1")).id().as_deref(), Some("u1"));
        assert_eq!(Identity::new(json!(42)).id().as_deref(), Some("42"));
        assert_eq!(Identity::new(json!({"id": "u2", "uid": "x"})).id().as_deref(), Some("u2"));
        assert_eq!(Identity::new(json!({"uid": 7})).id().as_deref(), Some("7"));
        assert_eq!(Identity::new(json!({"name": "n"})).id(), None);
        assert_eq!(Identity::new(json!([1])).id(), None);
    }

    fn sessions() -> Arc<SessionCookies> {
        let config = SessionConfig::default();
        Arc::new(SessionCookies::new(
            Arc::new(SessionCodec::new(&config.secret_key)),
            &config,
        ))
    }

    #[tokio::test]
    async fn test_codec_resolver() {
        let sessions = sessions();
        let cookie = sessions
            .issue_payload(&SessionPayload {
                source: "google".into(),
                user: json!({"id": "u1"}),
            })
            .unwrap()
            .unwrap();

        let resolver = CodecIdentityResolver::new(sessions);
        let identity = resolver.resolve(&cookie.value, Duration::from_secs(1)).await.unwrap();
        assert_eq!(identity.value(), &json!({"id": "u1"}));

        let err = resolver.resolve("garbage", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, IdentityError::Codec(CodecError::Malformed));
    }

    struct RecordingPool {
        calls: Mutex<Vec<(String, FunctionCall)>>,
    }

    #[async_trait]
    impl WorkerPool for RecordingPool {
        async fn call(&self, service: &str, call: FunctionCall, _timeout: Duration) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push((service.to_string(), call));
            Ok(json!("uid-9"))
        }

        async fn call_stream(&self, service: &str, _call: FunctionCall, _timeout: Duration) -> Result<EventStream, BackendError> {
            Err(BackendError::NoWorker(service.to_string()))
        }
    }

    #[tokio::test]
    async fn test_worker_resolver() {
        let pool = Arc::new(RecordingPool { calls: Mutex::new(Vec::new()) });
        let resolver = WorkerIdentityResolver::new(
            pool.clone(),
            WorkerFunctionConfig {
                service: "session_worker".into(),
                function: "getUidFromSessionText".into(),
            },
        );

        let identity = resolver.resolve("cookie-text", Duration::from_secs(30)).await.unwrap();
        assert_eq!(identity.id().as_deref(), Some("uid-9"));

        let calls = pool.calls.lock().unwrap();
        assert_eq!(calls[0].0, "session_worker");
        assert_eq!(
            calls[0].1,
            FunctionCall::new("getUidFromSessionText", vec![json!("cookie-text"), json!(30)])
        );
    }
}
