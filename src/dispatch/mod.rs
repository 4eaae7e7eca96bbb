//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! authorized CommandRequest
//!     → router.rs  unary:  WorkerPool::call        → JSON envelope
//!                  stream: WorkerPool::call_stream → relay.rs → chunked body
//! ```
//!
//! # Design Decisions
//! - A failed stream dispatch is reported like a unary failure; headers are
//!   only committed once the pool hands back an event channel
//! - The active streaming phase has no timeout; a dropped client body drops
//!   the receiver, which stops the producer on its next send

pub mod relay;
pub mod router;

pub use relay::{into_response, Completion, RelayOutcome, RelayState, StreamRelay};
pub use router::Dispatcher;
