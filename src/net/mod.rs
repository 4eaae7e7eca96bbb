//! Network layer.
//!
//! Plain listeners are handed straight to `axum::serve`; when
//! `listener.tls` is configured the server goes through `axum-server` with the
//! rustls config loaded here.

pub mod tls;

pub use tls::load_tls_config;
