//! HttpWorkerPool against a real worker listener, and the gateway on a bound
//! port driven with reqwest.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};

use worker_gateway::config::{PoolConfig, RetryConfig, WorkerConfig};
use worker_gateway::pool::{BackendError, FunctionCall, HttpWorkerPool, StreamEvent, WorkerPool};
use worker_gateway::{GatewayServer, Shutdown};

mod common;

fn pool_for(service: &str, addr: SocketAddr) -> HttpWorkerPool {
    HttpWorkerPool::new(
        &[WorkerConfig {
            service: service.into(),
            address: addr.to_string(),
            max_connections: 4,
        }],
        &PoolConfig {
            connect_timeout_secs: 1,
            retries: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 10,
                max_delay_ms: 50,
            },
        },
    )
}

#[tokio::test]
async fn test_unary_call_round_trip() {
    let addr = common::start_mock_worker().await;
    let pool = pool_for("user-service", addr);
    assert_eq!(pool.worker_count("user-service"), 1);

    let result = pool
        .call(
            "user-service",
            FunctionCall::new("getUser", vec![json!("42")]),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({"echo": {"function": "getUser", "params": ["42"]}})
    );
}

#[tokio::test]
async fn test_worker_error_is_remote() {
    let addr = common::start_mock_worker().await;
    let pool = pool_for("user-service", addr);

    let err = pool
        .call(
            "user-service",
            FunctionCall::new("getUser", vec![json!("missing")]),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::Remote("user not found".into()));
}

#[tokio::test]
async fn test_unknown_service_has_no_worker() {
    let addr = common::start_mock_worker().await;
    let pool = pool_for("user-service", addr);
    let err = pool
        .call("other", FunctionCall::new("f", vec![]), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err, BackendError::NoWorker("other".into()));
}

#[tokio::test]
async fn test_unreachable_worker_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let pool = pool_for("svc", addr);
    let err = pool
        .call("svc", FunctionCall::new("f", vec![]), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_stream_frames() {
    let addr = common::start_mock_worker().await;
    let pool = pool_for("logs", addr);

    let mut events = pool
        .call_stream("logs", FunctionCall::new("tail", vec![]), Duration::from_secs(5))
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            break;
        }
    }
    assert_eq!(
        collected,
        vec![
            StreamEvent::data("hello "),
            StreamEvent::data("world"),
            StreamEvent::End
        ]
    );
}

#[tokio::test]
async fn test_gateway_over_tcp() {
    let worker = common::start_mock_worker().await;

    let mut config = common::test_config();
    config.workers = vec![
        WorkerConfig {
            service: "user-service".into(),
            address: worker.to_string(),
            max_connections: 4,
        },
        WorkerConfig {
            service: "logs".into(),
            address: worker.to_string(),
            max_connections: 4,
        },
    ];

    let server = GatewayServer::from_config(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/api/pcp", gateway_addr);

    let envelope: Value = client
        .post(&url)
        .json(&json!(["user-service", ["getUser", "42"], 5]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope["errno"], 0);
    assert_eq!(envelope["text"]["echo"]["params"], json!(["42"]));

    let streamed = client
        .post(&url)
        .json(&json!(["proxyStream", "logs", ["tail"], 5]))
        .send()
        .await
        .unwrap();
    assert_eq!(streamed.headers()["x-content-type-options"], "nosniff");
    assert_eq!(streamed.text().await.unwrap(), "hello world");

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
