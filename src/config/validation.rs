//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Keep the public and private service sets disjoint
//! - Detect endpoint collisions between built-in, OAuth and webhook routes
//! - Validate value ranges (non-empty secrets, expiry > 0, parseable addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// Routes owned by the gateway itself.
pub const RESERVED_ENDPOINTS: &[&str] = &["/api/pcp", "/logout", "/healthz"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("service `{0}` is listed as both public and private")]
    ServiceInBothSets(String),

    #[error("session.secret_key must not be empty")]
    EmptySecretKey,

    #[error("session.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("session.expire_secs must be greater than zero")]
    ZeroExpiry,

    #[error("endpoint `{0}` must start with `/`")]
    RelativeEndpoint(String),

    #[error("endpoint `{0}` is registered more than once")]
    DuplicateEndpoint(String),

    #[error("worker address `{0}` is not a valid socket address")]
    InvalidWorkerAddress(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let public: HashSet<&str> = config.policy.public.iter().map(String::as_str).collect();
    let mut overlap: Vec<&str> = config
        .policy
        .private
        .iter()
        .map(String::as_str)
        .filter(|s| public.contains(s))
        .collect();
    overlap.sort_unstable();
    overlap.dedup();
    errors.extend(
        overlap
            .into_iter()
            .map(|s| ValidationError::ServiceInBothSets(s.to_string())),
    );

    if config.session.secret_key.is_empty() {
        errors.push(ValidationError::EmptySecretKey);
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }
    if config.session.expire_secs == 0 {
        errors.push(ValidationError::ZeroExpiry);
    }

    let mut seen: HashSet<&str> = RESERVED_ENDPOINTS.iter().copied().collect();
    let endpoints = config
        .oauth
        .iter()
        .flat_map(|o| [o.login_endpoint.as_str(), o.callback_endpoint.as_str()])
        .chain(config.webhooks.iter().map(|w| w.endpoint.as_str()));
    for endpoint in endpoints {
        if !endpoint.starts_with('/') {
            errors.push(ValidationError::RelativeEndpoint(endpoint.to_string()));
        } else if !seen.insert(endpoint) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.to_string()));
        }
    }

    for worker in &config.workers {
        if worker.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidWorkerAddress(worker.address.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
