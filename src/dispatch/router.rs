//! Forwards authorized calls to the worker pool.

use std::sync::Arc;

use serde_json::Value;

use crate::command::CommandRequest;
use crate::error::GatewayError;
use crate::pool::{EventStream, WorkerPool};

/// Routes authorized calls to the pool. Performs no policy checks.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<dyn WorkerPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    /// One call, one result, bounded by the request timeout.
    pub async fn unary(&self, request: &CommandRequest) -> Result<Value, GatewayError> {
        tracing::debug!(
            service = %request.service_name,
            function = %request.function_name,
            timeout_secs = request.timeout.as_secs(),
            "Dispatching call"
        );
        let result = self
            .pool
            .call(&request.service_name, request.function_call(), request.timeout)
            .await?;
        Ok(result)
    }

    /// Open a stream. A failure here happens before any header is sent.
    pub async fn stream(&self, request: &CommandRequest) -> Result<EventStream, GatewayError> {
        tracing::debug!(
            service = %request.service_name,
            function = %request.function_name,
            "Dispatching stream"
        );
        let events = self
            .pool
            .call_stream(&request.service_name, request.function_call(), request.timeout)
            .await?;
        Ok(events)
    }
}
