//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_commands_total` (counter): commands by name and errno
//! - `gateway_command_duration_seconds` (histogram): time to first byte per command
//! - `gateway_streams_total` (counter): streaming responses by outcome
//! - `gateway_oauth_total` (counter): OAuth steps by outcome
//! - `gateway_webhooks_total` (counter): webhook replies by status
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_command(command: &'static str, errno: i32, started: Instant) {
    counter!("gateway_commands_total", "command" => command, "errno" => errno.to_string())
        .increment(1);
    histogram!("gateway_command_duration_seconds", "command" => command)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_stream(outcome: &'static str) {
    counter!("gateway_streams_total", "outcome" => outcome).increment(1);
}

pub fn record_oauth(step: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("gateway_oauth_total", "step" => step, "outcome" => outcome).increment(1);
}

pub fn record_webhook(status: u16) {
    counter!("gateway_webhooks_total", "status" => status.to_string()).increment(1);
}
