//! Startup configuration errors and the artifact acquisition error taxonomy.

use thiserror::Error;

/// Fatal construction-time errors. Nothing in the run can proceed without a
/// writable local repository, so these surface immediately.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Local repository '{path}' is not writable: {message}")]
    UnwritableLocalRepo { path: String, message: String },

    #[error("Custom repository path '{path}' does not exist")]
    MissingCustomPath { path: String },

    #[error("Invalid classifier '{classifier}': path separators are not allowed")]
    InvalidClassifier { classifier: String },

    #[error("Invalid artifact coordinate '{coordinate}'")]
    InvalidCoordinate { coordinate: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Per-attempt acquisition failures, categorized for the retry loop.
///
/// Retryability is a property of the category, decided once in
/// [`FetchError::is_retryable`] so the retry loop stays a plain tag inspection.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error for '{url}': {message}")]
    Network { url: String, message: String },

    #[error("Repository returned HTTP {status} for '{url}'")]
    Repository { url: String, status: u16 },

    #[error("Partial download violation for '{path}': {message}")]
    PartialDownload { path: String, message: String },

    #[error("File system error at '{path}': {message}")]
    FileSystem { path: String, message: String },

    #[error("Server did not honor range request for '{url}'")]
    RangeNotSupported { url: String },

    #[error("Insufficient disk space at '{path}': need {needed} bytes, {available} available")]
    InsufficientDiskSpace {
        path: String,
        needed: u64,
        available: u64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unexpected error: {message}")]
    Unknown { message: String },
}

impl FetchError {
    /// Whether another attempt against the same repository may succeed.
    ///
    /// Network errors and 5xx/408/429 responses are retryable; everything
    /// else (other 4xx, disk, config, range violations) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::PartialDownload { .. } => true,
            Self::Repository { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            Self::FileSystem { .. }
            | Self::RangeNotSupported { .. }
            | Self::InsufficientDiskSpace { .. }
            | Self::Config(_)
            | Self::Unknown { .. } => false,
        }
    }

    /// A 404 is a miss, not a failure: the next repository is tried without
    /// consuming any retry budget.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
