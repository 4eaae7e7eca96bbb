//! Per-request context.
//!
//! # Responsibilities
//! - Capture what downstream layers need from the HTTP request (request id,
//!   method, URI, headers) as one typed value
//! - Cookie lookup for the authorization gate
//! - Derive the externally visible origin for OAuth callbacks
//!
//! # Design Decisions
//! - Built once per request and passed by reference; no type-erased attachment
//! - The request id comes from the `x-request-id` header set by tower-http;
//!   requests that bypassed the layer get a fresh v4 id

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};

use crate::session::parse_cookie;

pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request extension marking connections accepted by the TLS listener.
#[derive(Debug, Clone, Copy)]
pub struct ListenerTls;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Whether the listener terminated TLS for this request.
    pub tls: bool,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, tls: bool) -> Self {
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            request_id,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            tls,
        }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        parse_cookie(&self.headers, name)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// `scheme://host` as seen by the client.
    pub fn origin(&self) -> String {
        let scheme = self
            .headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| self.uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| if self.tls { "https" } else { "http" }.to_string());

        let host = self
            .headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        format!("{}://{}", scheme, host)
    }

    /// Callback host for OAuth: `?host=` wins over the request's own origin.
    pub fn redirect_host(&self) -> String {
        self.query_param("host").unwrap_or_else(|| self.origin())
    }

    /// Path and query as received.
    pub fn request_url(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.to_string())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tls = parts.extensions.get::<ListenerTls>().is_some();
        Ok(Self::from_parts(parts, tls))
    }
}
