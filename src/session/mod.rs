//! Client-held encrypted sessions.
//!
//! # Data Flow
//! ```text
//! OAuth callback
//!     → SessionPayload {source, user} → JSON
//!     → codec.rs (encrypt) → cookie.rs (Set-Cookie with path + expiry)
//!
//! Private / admin command
//!     → cookie.rs (read cookie by name)
//!     → identity resolver (codec.rs decrypt, or a session worker)
//! ```
//!
//! # Design Decisions
//! - Nothing is stored server-side; the cookie is the whole session
//! - Removal overwrites with a sentinel and a negative max-age
//! - Cookie values and secrets are never logged

pub mod codec;
pub mod cookie;

pub use codec::{CodecError, SessionCodec};
pub use cookie::{parse_cookie, SessionCookie, SessionCookies, SessionPayload};
