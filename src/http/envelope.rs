//! JSON envelope for non-streaming responses.
//!
//! `{ "text": <result|null>, "errno": <int>, "errMsg": <string> }`, always
//! sent with HTTP 200.

use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub text: Value,
    pub errno: i32,
    #[serde(rename = "errMsg")]
    pub err_msg: String,
}

impl Envelope {
    pub fn ok(text: Value) -> Self {
        Self {
            text,
            errno: 0,
            err_msg: String::new(),
        }
    }

    pub fn error(err: &GatewayError) -> Self {
        Self {
            text: Value::Null,
            errno: err.errno(),
            err_msg: err.to_string(),
        }
    }

    pub fn from_result(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(text) => Self::ok(text),
            Err(err) => Self::error(&err),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        Envelope::error(&self).into_response()
    }
}
