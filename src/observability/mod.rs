//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, request id as a field)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Cookie values and the session secret are never logged
//! - Metrics are off by default; recording without an exporter is free

pub mod logging;
pub mod metrics;
