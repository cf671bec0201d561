//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// How identities and passwords are generated.
    pub identity: IdentityConfig,

    /// Heartbeat and read-deadline settings.
    pub liveness: LivenessConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Apply command-line overrides on top of file or default values.
    pub fn with_overrides(mut self, port: Option<u16>, domain: Option<String>) -> Self {
        if let Some(port) = port {
            let host = self
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.listener.bind_address = format!("{}:{}", host, port);
        }
        if let Some(domain) = domain {
            self.identity.domain = domain;
        }
        self
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Identity generation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Scheme of the public identity URLs handed to clients.
    pub scheme: String,

    /// Domain appended to each generated label (may carry a port).
    pub domain: String,

    /// Length of the generated subdomain label.
    pub subdomain_len: usize,

    /// Length of the generated group password.
    pub password_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            domain: "localhost:8080".to_string(),
            subdomain_len: 8,
            password_len: 6,
        }
    }
}

/// Liveness supervision settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Read deadline in milliseconds; each pong extends it by this much.
    /// Heartbeats go out every nine tenths of it.
    pub read_deadline_ms: u64,
}

impl LivenessConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            read_deadline_ms: 60_000,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum relayed body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
