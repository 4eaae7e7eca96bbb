//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + PORT env
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never changes afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, OAuthConfig, ObservabilityConfig, PolicyConfig, PoolConfig,
    RetryConfig, SessionConfig, TlsConfig, WebhookConfig, WorkerConfig, WorkerFunctionConfig,
};
pub use validation::{validate_config, ValidationError};
