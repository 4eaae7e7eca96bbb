//! HTTP transport to backend workers.
//!
//! # Responsibilities
//! - Group configured workers by service name
//! - Send unary calls to `/call` and streaming calls to `/stream`
//! - Retry connection failures with backoff
//! - Pump streamed frames into a bounded event channel

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use futures_util::StreamExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::{PoolConfig, WorkerConfig};
use crate::pool::balancer::RoundRobin;
use crate::pool::frames::FrameDecoder;
use crate::pool::retry::RetryPolicy;
use crate::pool::worker::{Worker, WorkerGuard};
use crate::pool::{BackendError, EventStream, FunctionCall, StreamEvent, WorkerPool};

/// Upper bound on a buffered unary response.
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Default)]
struct WorkerGroup {
    workers: Vec<Arc<Worker>>,
    balancer: RoundRobin,
}

/// Default `WorkerPool` speaking JSON over HTTP to each worker.
pub struct HttpWorkerPool {
    groups: HashMap<String, WorkerGroup>,
    client: Client<HttpConnector, Body>,
    retry: RetryPolicy,
}

impl HttpWorkerPool {
    pub fn new(workers: &[WorkerConfig], config: &PoolConfig) -> Self {
        let mut groups: HashMap<String, WorkerGroup> = HashMap::new();

        for worker in workers {
            let parsed = worker
                .address
                .parse()
                .ok()
                .and_then(|addr| Worker::new(addr, worker.max_connections).ok());
            match parsed {
                Some(w) => groups
                    .entry(worker.service.clone())
                    .or_default()
                    .workers
                    .push(Arc::new(w)),
                None => tracing::warn!(address = %worker.address, "Invalid worker address"),
            }
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        tracing::info!(services = groups.len(), "Worker pool initialized");

        Self {
            groups,
            client,
            retry: RetryPolicy::new(&config.retries),
        }
    }

    /// Number of workers registered for a service.
    pub fn worker_count(&self, service: &str) -> usize {
        self.groups.get(service).map_or(0, |g| g.workers.len())
    }

    fn acquire(&self, service: &str) -> Result<WorkerGuard, BackendError> {
        let group = self
            .groups
            .get(service)
            .ok_or_else(|| BackendError::NoWorker(service.to_string()))?;
        group.balancer.acquire(&group.workers).ok_or_else(|| {
            tracing::debug!(service = %service, workers = group.workers.len(), "All workers saturated");
            BackendError::NoWorker(service.to_string())
        })
    }

    /// Deliver the call to some worker, retrying only failures to connect.
    async fn send(
        &self,
        service: &str,
        path: &str,
        call: &FunctionCall,
    ) -> Result<(WorkerGuard, hyper::Response<Incoming>), BackendError> {
        let payload = serde_json::to_vec(call)
            .map_err(|e| BackendError::Transport(format!("failed to encode call: {}", e)))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let worker = self.acquire(service)?;

            let uri: Uri = worker
                .endpoint(path)
                .map_err(|e| BackendError::Transport(e.to_string()))?
                .as_str()
                .parse()
                .map_err(|e: axum::http::uri::InvalidUri| BackendError::Transport(e.to_string()))?;

            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.clone()))
                .map_err(|e| BackendError::Transport(e.to_string()))?;

            match self.client.request(request).await {
                Ok(response) => return Ok((worker, response)),
                Err(e) if e.is_connect() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        service = %service,
                        worker = %worker.addr,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Worker connection failed, retrying"
                    );
                    drop(worker);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(service = %service, worker = %worker.addr, attempt, error = %e, "Worker request failed");
                    return Err(BackendError::Transport(e.to_string()));
                }
            }
        }
    }
}

async fn read_body(response: hyper::Response<Incoming>) -> Result<axum::body::Bytes, BackendError> {
    axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
        .await
        .map_err(|e| BackendError::Transport(format!("failed to read worker response: {}", e)))
}

fn timed_out(service: &str, timeout: Duration) -> BackendError {
    BackendError::Timeout {
        service: service.to_string(),
        secs: timeout.as_secs(),
    }
}

#[async_trait]
impl WorkerPool for HttpWorkerPool {
    async fn call(
        &self,
        service: &str,
        call: FunctionCall,
        timeout: Duration,
    ) -> Result<Value, BackendError> {
        let exchange = async {
            let (_worker, response) = self.send(service, "/call", &call).await?;
            let status = response.status();
            let bytes = read_body(response).await?;

            if !status.is_success() {
                return Err(BackendError::Remote(String::from_utf8_lossy(&bytes).into_owned()));
            }
            serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| timed_out(service, timeout))?
    }

    async fn call_stream(
        &self,
        service: &str,
        call: FunctionCall,
        timeout: Duration,
    ) -> Result<EventStream, BackendError> {
        let (worker, response) = tokio::time::timeout(timeout, self.send(service, "/stream", &call))
            .await
            .map_err(|_| timed_out(service, timeout))??;

        let status = response.status();
        if !status.is_success() {
            let bytes = read_body(response).await?;
            return Err(BackendError::Remote(String::from_utf8_lossy(&bytes).into_owned()));
        }

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(pump_frames(worker, response, tx));
        Ok(rx)
    }
}

/// Forward frames from the worker body to the relay until a terminal event.
///
/// The worker slot stays claimed for the whole stream.
async fn pump_frames(
    worker: WorkerGuard,
    response: hyper::Response<Incoming>,
    tx: mpsc::Sender<StreamEvent>,
) {
    let mut body = Body::new(response.into_body()).into_data_stream();
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => decoder.push(&bytes),
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(format!("worker stream failed: {}", e))).await;
                return;
            }
        }

        while let Some(event) = decoder.next_event() {
            let terminal = event.is_terminal();
            if tx.send(event).await.is_err() {
                tracing::debug!(worker = %worker.addr, "Stream consumer went away");
                return;
            }
            if terminal {
                return;
            }
        }
    }

    match decoder.finish() {
        Some(event) if event.is_terminal() => {
            let _ = tx.send(event).await;
            return;
        }
        Some(data) => {
            if tx.send(data).await.is_err() {
                return;
            }
        }
        None => {}
    }
    let _ = tx
        .send(StreamEvent::Error(
            "worker stream closed without a terminal event".to_string(),
        ))
        .await;
}
