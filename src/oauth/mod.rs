//! OAuth login handshake.
//!
//! # Data Flow
//! ```text
//! GET {login_endpoint}[?host=]
//!     → provider.construct_login_url(host) → 307 to consent page
//!
//! GET {callback_endpoint}?<provider params>[&host=]
//!     → provider.resolve_user(host, request_url)
//!     → SessionPayload { source: login_type, user }
//!     → SessionCookies::issue_payload → Set-Cookie + 307 to /
//! ```
//!
//! # Design Decisions
//! - No state is kept between the two steps beyond what the provider encodes
//!   in its own redirect URL
//! - Failures are written as plain text with status 200 and no redirect

pub mod flow;
pub mod provider;

pub use flow::routes;
pub use provider::{OAuthProvider, ProviderError, WorkerOAuthProvider, PROVIDER_CALL_TIMEOUT};
