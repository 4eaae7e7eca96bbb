//! Session cookie assembly and parsing.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SessionConfig;
use crate::session::codec::{CodecError, SessionCodec};

/// Value written over the cookie when a session is removed.
pub const REMOVED_SENTINEL: &str = "deleted";

/// Plaintext stored inside the encrypted cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Login type of the provider that authenticated the user.
    pub source: String,
    pub user: Value,
}

/// A `Set-Cookie` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
}

impl SessionCookie {
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{}={}; Path={}; HttpOnly", self.name, self.value, self.path);
        if let Some(expires) = self.expires {
            cookie.push_str(&format!(
                "; Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        // RFC 6265: a non-positive Max-Age expires the cookie immediately.
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age.max(0)));
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Issues, reads and removes the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    codec: Arc<SessionCodec>,
    name: String,
    path: String,
    expire: Duration,
}

impl SessionCookies {
    pub fn new(codec: Arc<SessionCodec>, config: &SessionConfig) -> Self {
        Self {
            codec,
            name: config.cookie_name.clone(),
            path: config.path.clone(),
            expire: Duration::from_secs(config.expire_secs),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &Arc<SessionCodec> {
        &self.codec
    }

    /// Encrypt `plaintext` into a fresh cookie.
    ///
    /// Returns `None` for an empty plaintext: nothing is stored at all.
    pub fn issue(&self, plaintext: &str) -> Result<Option<SessionCookie>, CodecError> {
        if plaintext.is_empty() {
            return Ok(None);
        }

        let value = self.codec.encrypt(plaintext)?;
        let expires = chrono::Duration::from_std(self.expire)
            .ok()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Ok(Some(SessionCookie {
            name: self.name.clone(),
            value,
            path: self.path.clone(),
            expires,
            max_age: None,
        }))
    }

    pub fn issue_payload(&self, payload: &SessionPayload) -> Result<Option<SessionCookie>, CodecError> {
        let plaintext =
            serde_json::to_string(payload).map_err(|e| CodecError::Payload(e.to_string()))?;
        self.issue(&plaintext)
    }

    /// Cookie that makes the client drop its session immediately.
    pub fn removal(&self) -> SessionCookie {
        SessionCookie {
            name: self.name.clone(),
            value: REMOVED_SENTINEL.to_string(),
            path: self.path.clone(),
            expires: None,
            max_age: Some(-1),
        }
    }

    /// Decrypt a raw cookie value.
    pub fn open(&self, raw: &str) -> Result<String, CodecError> {
        self.codec.decrypt(raw)
    }

    pub fn open_payload(&self, raw: &str) -> Result<SessionPayload, CodecError> {
        let plaintext = self.open(raw)?;
        serde_json::from_str(&plaintext).map_err(|e| CodecError::Payload(e.to_string()))
    }
}

/// Find a cookie by name across all `Cookie` headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}
