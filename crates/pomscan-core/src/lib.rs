//! Shared foundations for pomscan.
//!
//! Coordinate value types, the Maven repository-layout path rules, run
//! configuration with fail-fast validation, and the acquisition error
//! taxonomy used across the workspace.

pub mod config;
pub mod coordinate;
pub mod error;
pub mod layout;

pub use config::{FetchConfig, PolicyConfig, RetryConfig};
pub use coordinate::{ArtifactCoordinate, Coordinate};
pub use error::{ConfigError, FetchError, Result};
pub use layout::{repo_relative_path, repo_url};
