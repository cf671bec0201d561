//! Identity generation subsystem.
//!
//! # Data Flow
//! ```text
//! /connect upgrade
//!     → generator.rs (random subdomain label + group password)
//!     → label.rs (label + domain → identity URL)
//!     → registry stores group under the label
//!
//! Inbound webhook / join request
//!     → label.rs (Host header or join URL → leftmost label)
//!     → registry lookup by label
//! ```
//!
//! # Design Decisions
//! - Labels come from the OS CSPRNG; guessing another user's tunnel must be infeasible
//! - Subdomain labels are lowercase since DNS host names are case-insensitive
//! - Password comparison is constant-time

pub mod generator;
pub mod label;

pub use generator::{generate, passwords_match, Alphabet};
pub use label::{host_label, identity_url, url_label, validate_url};
