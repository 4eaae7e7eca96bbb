//! Command decoding.
//!
//! # Data Flow
//! ```text
//! POST body / GET query (JSON array)
//!     → parser.rs (shape checks, timeout conversion)
//!     → Command { kind, CommandRequest }
//!     → authorization gate
//! ```
//!
//! # Design Decisions
//! - Pure and side-effect free; every failure is `MalformedCommand`
//! - Errors carry the expected signature and the literal offending array

pub mod parser;

pub use parser::{
    parse_args, parse_command, Command, CommandKind, CommandRequest, DownloadConfig,
};
