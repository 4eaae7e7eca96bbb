//! Command array parsing.
//!
//! Grammars, as JSON arrays:
//!
//! ```text
//! proxy:       [serviceName, [funName, ...params], timeoutSeconds]
//! download:    [serviceName, [funName, ...params], {filename?, contentType?}, timeoutSeconds]
//! proxyStream: [serviceName, [funName, ...params], timeoutSeconds]
//! proxyAdmin:  [serviceName, [funName, ...params], timeoutSeconds]
//! ```
//!
//! The request array is either a bare `proxy` argument list, or
//! `[command, ...args]` naming one of the grammars above.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::pool::FunctionCall;

pub const PROXY_SIGNATURE: &str =
    "proxy(serviceName: string, [funName: string, ...params], timeoutSeconds: number)";
pub const DOWNLOAD_SIGNATURE: &str = "download(serviceName: string, [funName: string, ...params], downloadConfig: {filename?, contentType?}, timeoutSeconds: number)";
pub const PROXY_STREAM_SIGNATURE: &str =
    "proxyStream(serviceName: string, [funName: string, ...params], timeoutSeconds: number)";
pub const PROXY_ADMIN_SIGNATURE: &str =
    "proxyAdmin(serviceName: string, [funName: string, ...params], timeoutSeconds: number)";

/// Response shaping for `download` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// A parsed, not yet authorized call.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub service_name: String,
    pub function_name: String,
    pub params: Vec<Value>,
    pub timeout: Duration,
    pub download: Option<DownloadConfig>,
}

impl CommandRequest {
    pub fn function_call(&self) -> FunctionCall {
        FunctionCall::new(self.function_name.clone(), self.params.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Proxy,
    Download,
    ProxyStream,
    ProxyAdmin,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "proxy" => Some(CommandKind::Proxy),
            "download" => Some(CommandKind::Download),
            "proxyStream" => Some(CommandKind::ProxyStream),
            "proxyAdmin" => Some(CommandKind::ProxyAdmin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Proxy => "proxy",
            CommandKind::Download => "download",
            CommandKind::ProxyStream => "proxyStream",
            CommandKind::ProxyAdmin => "proxyAdmin",
        }
    }

    pub fn signature(self) -> &'static str {
        match self {
            CommandKind::Proxy => PROXY_SIGNATURE,
            CommandKind::Download => DOWNLOAD_SIGNATURE,
            CommandKind::ProxyStream => PROXY_STREAM_SIGNATURE,
            CommandKind::ProxyAdmin => PROXY_ADMIN_SIGNATURE,
        }
    }

    pub fn is_streaming(self) -> bool {
        matches!(self, CommandKind::Download | CommandKind::ProxyStream)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub request: CommandRequest,
}

/// Parse a decoded request document into a command.
pub fn parse_command(document: &Value) -> Result<Command, GatewayError> {
    let arr = match document {
        Value::Array(arr) => arr.as_slice(),
        other => return Err(GatewayError::malformed(PROXY_SIGNATURE, std::slice::from_ref(other))),
    };

    let named = arr
        .first()
        .and_then(Value::as_str)
        .and_then(CommandKind::from_name)
        .filter(|_| !arr.get(1).is_some_and(Value::is_array));

    let (kind, args) = match named {
        Some(kind) => (kind, &arr[1..]),
        None => (CommandKind::Proxy, arr),
    };

    Ok(Command {
        kind,
        request: parse_args(kind, args)?,
    })
}

/// Validate the argument list of one command kind.
pub fn parse_args(kind: CommandKind, args: &[Value]) -> Result<CommandRequest, GatewayError> {
    let malformed = || GatewayError::malformed(kind.signature(), args);

    let (download, timeout_at) = match kind {
        CommandKind::Download => {
            if args.len() < 4 {
                return Err(malformed());
            }
            let config: DownloadConfig = match &args[2] {
                Value::Object(_) => {
                    serde_json::from_value(args[2].clone()).map_err(|_| malformed())?
                }
                _ => return Err(malformed()),
            };
            (Some(config), 3)
        }
        _ => {
            if args.len() < 3 {
                return Err(malformed());
            }
            (None, 2)
        }
    };

    let service_name = args[0].as_str().ok_or_else(malformed)?.to_string();

    let (function_name, params) = match args[1].as_array().map(Vec::as_slice) {
        Some([Value::String(name), rest @ ..]) => (name.clone(), rest.to_vec()),
        _ => return Err(malformed()),
    };

    let seconds = args[timeout_at].as_f64().ok_or_else(malformed)?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(malformed());
    }

    Ok(CommandRequest {
        service_name,
        function_name,
        params,
        // Fractional seconds are truncated.
        timeout: Duration::from_secs(seconds as u64),
        download,
    })
}
