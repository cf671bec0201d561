//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration from file when one is given, defaults otherwise
//! - Apply command-line overrides
//! - Validate the final configuration before anything binds
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides are validated together with file values

use std::path::Path;

use crate::config::{load_config, validate_config, ConfigError, RelayConfig};

/// Produce the effective server configuration.
pub fn resolve_config(
    path: Option<&Path>,
    port: Option<u16>,
    domain: Option<String>,
) -> Result<RelayConfig, ConfigError> {
    let base = match path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    let config = base.with_overrides(port, domain);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_and_domain_are_configurable() {
        let config = resolve_config(None, Some(8888), Some("test".into())).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8888");
        assert_eq!(config.identity.domain, "test");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let err = resolve_config(None, None, Some("bad domain".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
