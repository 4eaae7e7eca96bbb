//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use worker_gateway::config::{GatewayConfig, SessionConfig};
use worker_gateway::pool::{BackendError, EventStream, FunctionCall, StreamEvent, WorkerPool};
use worker_gateway::session::{SessionCodec, SessionCookies, SessionPayload};
use worker_gateway::GatewayServer;

/// One recorded pool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub service: String,
    pub call: FunctionCall,
    pub timeout: Duration,
    pub streaming: bool,
}

/// In-memory worker pool with scripted replies per service.
#[derive(Default)]
pub struct MockPool {
    replies: Mutex<HashMap<String, Result<Value, BackendError>>>,
    streams: Mutex<HashMap<String, Vec<StreamEvent>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, service: &str, result: Result<Value, BackendError>) {
        self.replies.lock().unwrap().insert(service.to_string(), result);
    }

    pub fn stream(&self, service: &str, events: Vec<StreamEvent>) {
        self.streams.lock().unwrap().insert(service.to_string(), events);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, service: &str, call: FunctionCall, timeout: Duration, streaming: bool) {
        self.calls.lock().unwrap().push(RecordedCall {
            service: service.to_string(),
            call,
            timeout,
            streaming,
        });
    }
}

#[async_trait]
impl WorkerPool for MockPool {
    async fn call(&self, service: &str, call: FunctionCall, timeout: Duration) -> Result<Value, BackendError> {
        self.record(service, call, timeout, false);
        self.replies
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::NoWorker(service.to_string())))
    }

    async fn call_stream(&self, service: &str, call: FunctionCall, timeout: Duration) -> Result<EventStream, BackendError> {
        self.record(service, call, timeout, true);
        let events = self
            .streams
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .ok_or_else(|| BackendError::NoWorker(service.to_string()))?;

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

pub const SECRET: &str = "integration-secret";
pub const COOKIE_NAME: &str = "sid";

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.policy.public = vec!["user-service".into(), "files".into(), "logs".into()];
    config.policy.private = vec!["orders".into()];
    config.policy.admin = vec!["root".into()];
    config.session = SessionConfig {
        cookie_name: COOKIE_NAME.into(),
        secret_key: SECRET.into(),
        path: "/".into(),
        expire_secs: 3600,
        identity_service: None,
    };
    config
}

pub fn gateway(config: GatewayConfig, pool: Arc<MockPool>) -> Router {
    GatewayServer::new(config, pool).router()
}

/// `Cookie` header value for a session carrying `user`.
pub fn session_cookie(user: Value) -> String {
    let config = test_config().session;
    let sessions = SessionCookies::new(Arc::new(SessionCodec::new(SECRET)), &config);
    let cookie = sessions
        .issue_payload(&SessionPayload {
            source: "test".into(),
            user,
        })
        .unwrap()
        .unwrap();
    format!("{}={}", cookie.name, cookie.value)
}

pub fn post_command(document: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/pcp").header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(document.to_string())).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Start a worker speaking the `/call` + `/stream` protocol on an ephemeral
/// port. `/call` echoes the request; `getUser` with `"missing"` fails with 500;
/// `/stream` emits two data frames and an end frame.
pub async fn start_mock_worker() -> SocketAddr {
    async fn call(Json(request): Json<Value>) -> Response {
        if request["params"] == json!(["missing"]) {
            return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "user not found").into_response();
        }
        Json(json!({"echo": request})).into_response()
    }

    async fn stream(Json(_request): Json<Value>) -> String {
        [
            json!({"type": "data", "payload": "aGVsbG8g"}),
            json!({"type": "data", "payload": "d29ybGQ="}),
            json!({"type": "end"}),
        ]
        .iter()
        .map(|frame| format!("{}\n", frame))
        .collect()
    }

    let app = Router::new().route("/call", post(call)).route("/stream", post(stream));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
