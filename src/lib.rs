//! Worker gateway library.
//!
//! Exposes a fleet of RPC-callable worker services to web clients behind a
//! public / private / admin access policy with encrypted, client-held
//! sessions.

// Core pipeline
pub mod auth;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod session;

// Surfaces
pub mod http;
pub mod oauth;

// Collaborators
pub mod pool;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
