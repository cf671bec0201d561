//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lengths, deadlines, body limits)
//! - Check that generated identity URLs will be valid
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;
use crate::identity;

/// Longest label DNS allows.
const MAX_LABEL_LEN: usize = 63;
const MIN_SUBDOMAIN_LEN: usize = 4;
const MIN_PASSWORD_LEN: usize = 4;
const MIN_READ_DEADLINE_MS: u64 = 10;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let ident = &config.identity;
    if !matches!(ident.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new("identity.scheme", "must be http or https"));
    }
    if ident.domain.trim().is_empty() {
        errors.push(ValidationError::new("identity.domain", "must not be empty"));
    } else if !identity::validate_url(&identity::identity_url("http", &ident.domain, "sample")) {
        errors.push(ValidationError::new(
            "identity.domain",
            format!("'{}' does not form a valid URL", ident.domain),
        ));
    }
    if !(MIN_SUBDOMAIN_LEN..=MAX_LABEL_LEN).contains(&ident.subdomain_len) {
        errors.push(ValidationError::new(
            "identity.subdomain_len",
            format!("must be between {} and {}", MIN_SUBDOMAIN_LEN, MAX_LABEL_LEN),
        ));
    }
    if ident.password_len < MIN_PASSWORD_LEN {
        errors.push(ValidationError::new(
            "identity.password_len",
            format!("must be at least {}", MIN_PASSWORD_LEN),
        ));
    }

    if config.liveness.read_deadline_ms < MIN_READ_DEADLINE_MS {
        errors.push(ValidationError::new(
            "liveness.read_deadline_ms",
            format!("must be at least {}", MIN_READ_DEADLINE_MS),
        ));
    }

    // Wire lengths are u32.
    if config.limits.max_body_size == 0 || config.limits.max_body_size as u64 > u32::MAX as u64 {
        errors.push(ValidationError::new(
            "limits.max_body_size",
            "must be between 1 and 4294967295",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
