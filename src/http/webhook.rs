//! Webhook relay endpoints.
//!
//! Each configured endpoint forwards the raw request to a worker function
//! `(url, method, headers, body) -> {status, headers, body}` and replays the
//! reply.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::config::WebhookConfig;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::pool::{FunctionCall, WorkerPool};

pub const WEBHOOK_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// What the webhook function returns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookReply {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: String,
}

#[derive(Clone)]
struct WebhookState {
    pool: Arc<dyn WorkerPool>,
    hook: Arc<WebhookConfig>,
}

pub fn routes(webhooks: &[WebhookConfig], pool: Arc<dyn WorkerPool>) -> Router {
    webhooks.iter().fold(Router::new(), |router, hook| {
        let state = WebhookState {
            pool: pool.clone(),
            hook: Arc::new(hook.clone()),
        };
        router.merge(
            Router::new()
                .route(&hook.endpoint, any(relay_webhook))
                .with_state(state),
        )
    })
}

/// Request headers as `{name: [values]}`.
pub fn header_multimap(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

async fn relay_webhook(
    State(state): State<WebhookState>,
    ctx: RequestContext,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Ok(body) = body else {
        metrics::record_webhook(StatusCode::BAD_REQUEST.as_u16());
        return (StatusCode::BAD_REQUEST, "can't read body").into_response();
    };

    let call = FunctionCall::new(
        state.hook.function_name.clone(),
        vec![
            json!(ctx.request_url()),
            json!(ctx.method.as_str()),
            json!(header_multimap(&ctx.headers)),
            json!(String::from_utf8_lossy(&body)),
        ],
    );

    let reply = state
        .pool
        .call(&state.hook.service_name, call, WEBHOOK_CALL_TIMEOUT)
        .await
        .map_err(|e| e.to_string())
        .and_then(|value| serde_json::from_value::<WebhookReply>(value).map_err(|e| e.to_string()));

    let response = match reply.map(replay) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) | Err(e) => {
            tracing::warn!(
                request_id = %ctx.request_id,
                endpoint = %state.hook.endpoint,
                error = %e,
                "Webhook relay failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "server error").into_response()
        }
    };

    metrics::record_webhook(response.status().as_u16());
    response
}

/// Turn a worker reply into the HTTP response.
pub fn replay(reply: WebhookReply) -> Result<Response, String> {
    let status = StatusCode::from_u16(reply.status).map_err(|e| e.to_string())?;

    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, values) in reply.headers {
        let Ok(name) = HeaderName::try_from(name.as_str()) else {
            tracing::warn!(header = %name, "Dropping invalid webhook header name");
            continue;
        };
        for value in values {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => tracing::warn!(header = %name, "Dropping invalid webhook header value"),
            }
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_multimap() {
        let mut headers = HeaderMap::new();
        headers.append("x-sig", HeaderValue::from_static("a"));
        headers.append("x-sig", HeaderValue::from_static("b"));
        headers.append("content-type", HeaderValue::from_static("application/json"));

        let map = header_multimap(&headers);
        assert_eq!(map["x-sig"], vec!["a", "b"]);
        assert_eq!(map["content-type"], vec!["application/json"]);
    }

    #[test]
    fn test_replay() {
        let reply: WebhookReply = serde_json::from_value(json!({
            "status": 202,
            "headers": {"X-Hook": ["1", "2"], "bad name": ["x"]},
            "body": "accepted"
        }))
        .unwrap();
        let response = replay(reply).unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let values: Vec<_> = response.headers().get_all("x-hook").iter().collect();
        assert_eq!(values, vec!["1", "2"]);
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn test_replay_rejects_bad_status() {
        let reply = WebhookReply {
            status: 42,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        assert!(replay(reply).is_err());
    }
}
