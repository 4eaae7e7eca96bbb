//! Backend worker pool.
//!
//! # Data Flow
//! ```text
//! Authorized call (service, function, params, timeout)
//!     → WorkerPool::call        → one JSON result
//!     → WorkerPool::call_stream → bounded channel of StreamEvent
//!
//! HttpWorkerPool (default implementation):
//!     service name
//!     → balancer.rs (round-robin over workers with free slots)
//!     → worker.rs (connection slot guard)
//!     → retry.rs (connect failures only, capped backoff + jitter)
//!     → frames.rs (newline-delimited stream frames → StreamEvent)
//! ```
//!
//! # Design Decisions
//! - The gateway core only sees the `WorkerPool` trait; transport, pooling and
//!   retry stay behind it
//! - Streams are delivered through an mpsc channel of capacity 1, so the
//!   producer cannot run ahead of the consumer by more than one event
//! - Worker errors are carried verbatim in `BackendError::Remote`

pub mod balancer;
pub mod client;
pub mod frames;
pub mod retry;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub use client::HttpWorkerPool;

/// A function invocation addressed to a worker service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub function: String,
    pub params: Vec<Value>,
}

impl FunctionCall {
    pub fn new(function: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            params,
        }
    }
}

/// One unit of a streamed worker response.
///
/// A well-formed stream is zero or more `Data` events followed by exactly one
/// `End` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Data(Bytes),
    End,
    Error(String),
}

impl StreamEvent {
    pub fn data(payload: impl Into<Bytes>) -> Self {
        StreamEvent::Data(payload.into())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Data(_))
    }
}

/// Receiving half of a streaming call.
pub type EventStream = mpsc::Receiver<StreamEvent>;

/// Errors raised by the worker pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// No worker is registered for the service, or all are at capacity.
    #[error("no available worker for service `{0}`")]
    NoWorker(String),

    /// The call did not complete within its bound.
    #[error("call to `{service}` timed out after {secs}s")]
    Timeout { service: String, secs: u64 },

    /// Connection or protocol failure talking to the worker.
    #[error("transport error: {0}")]
    Transport(String),

    /// The worker answered with an error; message is passed through untouched.
    #[error("{0}")]
    Remote(String),

    /// The worker answered with something that is not valid for the call.
    #[error("invalid worker response: {0}")]
    Decode(String),
}

/// Client for the backend worker fleet.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Issue a unary call bounded by `timeout`.
    async fn call(
        &self,
        service: &str,
        call: FunctionCall,
        timeout: Duration,
    ) -> Result<Value, BackendError>;

    /// Open a streaming call. Only the initial dispatch is bounded by `timeout`.
    async fn call_stream(
        &self,
        service: &str,
        call: FunctionCall,
        timeout: Duration,
    ) -> Result<EventStream, BackendError>;
}
