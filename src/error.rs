//! Gateway error taxonomy.

use serde_json::Value;
use thiserror::Error;

use crate::pool::BackendError;
use crate::session::CodecError;

/// Errno reported for authorization failures.
pub const ERRNO_UNAUTHORIZED: i32 = 403;
/// Errno reported for every other failure.
pub const ERRNO_GENERIC: i32 = 530;

/// Errors surfaced to callers of the command endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The command array does not match its grammar.
    #[error("malformed command: expected signature \"{signature}\", got {args}")]
    MalformedCommand { signature: &'static str, args: Value },

    /// The request body or query is not a JSON document.
    #[error("invalid command payload: {0}")]
    InvalidPayload(String),

    /// Missing or invalid session.
    #[error("{0}")]
    Unauthorized(String),

    /// The session is valid but not privileged for the call.
    #[error("{0}")]
    Forbidden(String),

    #[error("try to access unexported worker `{0}`")]
    UnknownService(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The session cookie could not be opened.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl GatewayError {
    pub fn malformed(signature: &'static str, args: &[Value]) -> Self {
        GatewayError::MalformedCommand {
            signature,
            args: Value::Array(args.to_vec()),
        }
    }

    pub fn errno(&self) -> i32 {
        match self {
            GatewayError::Unauthorized(_) | GatewayError::Forbidden(_) | GatewayError::Codec(_) => {
                ERRNO_UNAUTHORIZED
            }
            _ => ERRNO_GENERIC,
        }
    }
}
