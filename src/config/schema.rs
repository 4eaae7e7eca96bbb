//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Public/private/admin classification of worker services.
    pub policy: PolicyConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// OAuth login providers, one entry per provider.
    pub oauth: Vec<OAuthConfig>,

    /// Webhook endpoints relayed to worker functions.
    pub webhooks: Vec<WebhookConfig>,

    /// Backend worker addresses.
    pub workers: Vec<WorkerConfig>,

    /// Worker pool transport settings.
    pub pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Access policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Services callable without a session.
    pub public: Vec<String>,

    /// Services that receive the caller identity as first parameter.
    pub private: Vec<String>,

    /// Identities allowed to use `proxyAdmin`.
    pub admin: Vec<String>,

    /// When false, private services are refused even with a valid session.
    pub private_access: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            public: Vec::new(),
            private: Vec::new(),
            admin: Vec::new(),
            private_access: true,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name carrying the encrypted session.
    pub cookie_name: String,

    /// Secret the session key is derived from.
    pub secret_key: String,

    /// Cookie path.
    pub path: String,

    /// Cookie lifetime in seconds.
    pub expire_secs: u64,

    /// Resolve identities through a worker instead of decrypting locally.
    pub identity_service: Option<WorkerFunctionConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            secret_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            path: "/".to_string(),
            expire_secs: 7 * 24 * 3600,
            identity_service: None,
        }
    }
}

/// A function exported by a worker service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerFunctionConfig {
    pub service: String,
    pub function: String,
}

/// One OAuth provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthConfig {
    /// Path that redirects to the provider consent page.
    pub login_endpoint: String,

    /// Path the provider redirects back to.
    pub callback_endpoint: String,

    /// Worker service implementing the provider.
    pub service_name: String,

    /// Tag stored as the session `source`.
    pub login_type: String,
}

/// One webhook endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub service_name: String,
    pub function_name: String,
}

/// Backend worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Service this worker serves.
    pub service: String,

    /// Worker address (e.g., "127.0.0.1:9001").
    pub address: String,

    /// Maximum concurrent calls to this worker.
    #[serde(default = "default_max_worker_conns")]
    pub max_connections: usize,
}

fn default_max_worker_conns() -> usize {
    100
}

/// Worker pool transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Retry settings for connection failures.
    pub retries: RetryConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            retries: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
