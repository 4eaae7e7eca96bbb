//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Build server → Bind
//!
//! Shutdown:
//!     Ctrl+C / SIGTERM (signals.rs) → Shutdown::trigger (shutdown.rs)
//!     → servers stop accepting and drain in-flight requests
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
