//! The `/api/pcp` command endpoint.
//!
//! GET carries the command array in the raw query string, POST in the body.
//! Both end in the same parse → authorize → dispatch pipeline.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::auth::AccessMode;
use crate::command::{parse_command, CommandKind};
use crate::dispatch::relay;
use crate::error::GatewayError;
use crate::http::envelope::Envelope;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Decode a GET query: `+` is a space, then percent-decoding, then JSON.
pub fn decode_query(raw: &str) -> Result<Value, GatewayError> {
    let spaced = raw.replace('+', " ");
    let unescaped =
        urlencoding::decode(&spaced).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
    serde_json::from_str(&unescaped).map_err(|e| GatewayError::InvalidPayload(e.to_string()))
}

pub fn decode_body(body: &[u8]) -> Result<Value, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidPayload(e.to_string()))
}

pub async fn get_pcp(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let document = decode_query(ctx.uri.query().unwrap_or_default());
    execute(&state, &ctx, document).await
}

pub async fn post_pcp(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let document = body
        .map_err(|e| GatewayError::InvalidPayload(e.body_text()))
        .and_then(|body| decode_body(&body));
    execute(&state, &ctx, document).await
}

async fn execute(
    state: &AppState,
    ctx: &RequestContext,
    document: Result<Value, GatewayError>,
) -> Response {
    let started = Instant::now();

    let command = match document.and_then(|doc| parse_command(&doc)) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(request_id = %ctx.request_id, error = %e, "Rejected command");
            metrics::record_command("invalid", e.errno(), started);
            return e.into_response();
        }
    };

    let kind = command.kind;
    let mode = match kind {
        CommandKind::ProxyAdmin => AccessMode::Admin,
        _ => AccessMode::Standard,
    };

    let request = match state.gate.authorize(ctx, command.request, mode).await {
        Ok(request) => request,
        Err(e) => {
            metrics::record_command(kind.name(), e.errno(), started);
            return e.into_response();
        }
    };

    tracing::info!(
        request_id = %ctx.request_id,
        command = kind.name(),
        service = %request.service_name,
        function = %request.function_name,
        "Dispatching command"
    );

    if !kind.is_streaming() {
        let envelope = Envelope::from_result(state.dispatcher.unary(&request).await);
        if envelope.errno != 0 {
            tracing::warn!(
                request_id = %ctx.request_id,
                service = %request.service_name,
                error = %envelope.err_msg,
                "Call failed"
            );
        }
        metrics::record_command(kind.name(), envelope.errno, started);
        return envelope.into_response();
    }

    let events = match state.dispatcher.stream(&request).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(
                request_id = %ctx.request_id,
                service = %request.service_name,
                error = %e,
                "Stream dispatch failed"
            );
            metrics::record_command(kind.name(), e.errno(), started);
            return e.into_response();
        }
    };

    let download = match kind {
        CommandKind::Download => request.download.as_ref(),
        _ => None,
    };
    let (response, completion) = relay::into_response(events, download);
    metrics::record_command(kind.name(), 0, started);

    let request_id = ctx.request_id.clone();
    let service = request.service_name.clone();
    tokio::spawn(async move {
        let outcome = completion.wait().await;
        metrics::record_stream(outcome.label());
        tracing::info!(
            request_id = %request_id,
            service = %service,
            outcome = outcome.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stream finished"
        );
    });

    response
}
