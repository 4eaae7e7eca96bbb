//! Authorization subsystem.
//!
//! # Data Flow
//! ```text
//! CommandRequest + RequestContext
//!     → policy.rs (public / private / unknown)
//!     → identity.rs (session cookie → Identity, private and admin only)
//!     → gate.rs (prepend identity, admin membership)
//!     → dispatch
//! ```
//!
//! # Design Decisions
//! - The gate is the only place policy is enforced; dispatch trusts its output
//! - Identity is resolved fresh per request and never cached
//! - Any resolver failure is reported as `Unauthorized`

pub mod gate;
pub mod identity;
pub mod policy;

pub use gate::{AccessMode, AuthorizationGate};
pub use identity::{
    CodecIdentityResolver, Identity, IdentityError, IdentityResolver, WorkerIdentityResolver,
};
pub use policy::{AccessPolicy, NameSet, ServiceClass};
