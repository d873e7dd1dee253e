//! Run configuration.
//!
//! All tunables arrive here pre-parsed; validation is fail-fast because no
//! useful work can happen without a writable local repository.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const MAVEN_CENTRAL_URL: &str = "https://repo1.maven.org/maven2";

const MIN_POOL_SIZE: usize = 1;
const MAX_POOL_SIZE: usize = 20;

/// Retry/backoff settings for remote downloads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Artifact acquisition settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Local repository cache, written by downloads.
    pub local_repo: PathBuf,
    /// Optional pre-populated path checked before anything else. Either a
    /// directory in repository layout or a directory of plain jar files.
    pub custom_repo: Option<PathBuf>,
    /// Public fallback repository, tried after project-declared remotes.
    pub fallback_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    /// Enables the bounded worker pool.
    pub parallel: bool,
    /// Worker count, clamped to 1..=20 by `validate`.
    pub pool_size: usize,
    /// Parallel mode only engages when the artifact list is longer than this.
    pub parallel_threshold: usize,
    /// Ceiling on the whole acquisition run.
    pub overall_deadline: Duration,
    /// Extra free space required beyond the expected download size.
    pub disk_safety_margin: u64,
    /// A `.partial` sidecar older than this is discarded instead of resumed.
    pub partial_stale_age: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            local_repo: default_local_repo(),
            custom_repo: None,
            fallback_url: MAVEN_CENTRAL_URL.to_string(),
            user_agent: format!("pomscan/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            parallel: true,
            pool_size: 5,
            parallel_threshold: 2,
            overall_deadline: Duration::from_secs(30 * 60),
            disk_safety_margin: 50 * 1024 * 1024,
            partial_stale_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl FetchConfig {
    /// Validates and normalizes the configuration.
    ///
    /// Creates the local repository if absent and probes it with a write;
    /// an unwritable cache is fatal. Clamps the pool size into bounds.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(&self.local_repo).map_err(|e| {
            ConfigError::UnwritableLocalRepo {
                path: self.local_repo.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let probe = self.local_repo.join(".pomscan-write-probe");
        std::fs::write(&probe, b"probe").map_err(|e| ConfigError::UnwritableLocalRepo {
            path: self.local_repo.display().to_string(),
            message: e.to_string(),
        })?;
        let _ = std::fs::remove_file(&probe);

        if let Some(custom) = &self.custom_repo
            && !custom.exists()
        {
            return Err(ConfigError::MissingCustomPath {
                path: custom.display().to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "retry.max_attempts must be at least 1".into(),
            });
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(ConfigError::Invalid {
                message: "retry.initial_backoff exceeds retry.max_backoff".into(),
            });
        }
        if self.fallback_url.is_empty() {
            return Err(ConfigError::Invalid {
                message: "fallback repository URL is empty".into(),
            });
        }

        let clamped = self.pool_size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE);
        if clamped != self.pool_size {
            debug!(
                requested = self.pool_size,
                clamped, "download pool size out of bounds, clamping"
            );
            self.pool_size = clamped;
        }

        Ok(self)
    }
}

/// Depth thresholds for the transitive selection policy.
///
/// The range cutoffs mirror the conservative defaults of Maven-less range
/// handling: open-ended ranges are never trusted past direct dependencies,
/// bounded ranges only a few levels further.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Open-ended version ranges are rejected at depths beyond this.
    pub open_range_max_depth: u32,
    /// Bounded version ranges are rejected at depths beyond this.
    pub bounded_range_max_depth: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            open_range_max_depth: 1,
            bounded_range_max_depth: 3,
        }
    }
}

fn default_local_repo() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".m2").join("repository"))
        .unwrap_or_else(|| PathBuf::from(".m2/repository"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> FetchConfig {
        FetchConfig {
            local_repo: dir.path().join("repo"),
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_validate_creates_local_repo() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir).validate().unwrap();
        assert!(config.local_repo.is_dir());
    }

    #[test]
    fn test_validate_rejects_missing_custom_path() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.custom_repo = Some(dir.path().join("nope"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCustomPath { .. })
        ));
    }

    #[test]
    fn test_validate_clamps_pool_size() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.pool_size = 100;
        assert_eq!(config.validate().unwrap().pool_size, 20);

        let mut config = config_in(&dir);
        config.pool_size = 0;
        assert_eq!(config.validate().unwrap().pool_size, 1);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.retry.initial_backoff = Duration::from_secs(60);
        config.retry.max_backoff = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_defaults() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.open_range_max_depth, 1);
        assert_eq!(policy.bounded_range_max_depth, 3);
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert!(retry.initial_backoff < retry.max_backoff);
    }
}
