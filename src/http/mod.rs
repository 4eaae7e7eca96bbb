//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router, middleware, listeners)
//!     → request.rs (typed RequestContext per request)
//!     → /api/pcp   pcp.rs → parse → authorize → dispatch → envelope.rs | relay
//!     → /logout    clear cookie, 307 /
//!     → /healthz   "ok"
//!     → oauth      login / callback (crate::oauth)
//!     → webhooks   webhook.rs
//! ```

pub mod envelope;
pub mod pcp;
pub mod request;
pub mod response;
pub mod server;
pub mod webhook;

pub use envelope::Envelope;
pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
