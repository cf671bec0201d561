//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → command-line overrides (port, domain)
//!     → RelayConfig (validated, immutable)
//!     → shared with the registry, supervisors and HTTP server
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the server runs with no file at all
//! - Validation separates syntactic (serde) from semantic checks
//! - Validation reports every problem, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    IdentityConfig, LimitsConfig, ListenerConfig, LivenessConfig, ObservabilityConfig,
    RelayConfig,
};
pub use validation::{validate_config, ValidationError};
