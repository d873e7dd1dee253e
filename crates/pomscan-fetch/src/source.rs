//! Download tiers and terminal per-artifact outcomes.

use std::fmt;
use std::path::PathBuf;

/// A remote repository declared by the project POM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub id: String,
    pub url: String,
}

impl RemoteRepo {
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.trim_end_matches('/').to_string(),
        }
    }
}

/// Where an artifact was found or downloaded from.
///
/// One variant per lookup tier; tiers are tried strictly in declaration
/// order, first hit wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// User-supplied pre-populated path.
    LocalCustom { path: PathBuf },
    /// The default local repository cache.
    LocalDefault { path: PathBuf },
    /// A repository declared in the project POM.
    DeclaredRemote { id: String, url: String },
    /// The configured public fallback repository.
    Fallback { url: String },
}

impl fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalCustom { path } => write!(f, "custom path {}", path.display()),
            Self::LocalDefault { path } => write!(f, "local repository {}", path.display()),
            Self::DeclaredRemote { id, url } => write!(f, "declared repository '{id}' ({url})"),
            Self::Fallback { url } => write!(f, "fallback repository {url}"),
        }
    }
}

/// Terminal result for one artifact. Never retried once produced.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// Downloaded from a remote tier.
    Success { source: DownloadSource, path: PathBuf },
    /// Exhausted all tiers with a hard failure.
    Failed { message: String },
    /// Already present locally; no network was touched.
    SkippedLocal { source: DownloadSource, path: PathBuf },
    /// Every repository answered 404.
    SkippedNotFound { message: String },
}

impl DownloadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Success { path, .. } | Self::SkippedLocal { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_repo_trims_trailing_slash() {
        let repo = RemoteRepo::new("central", "https://repo1.maven.org/maven2/");
        assert_eq!(repo.url, "https://repo1.maven.org/maven2");
    }

    #[test]
    fn test_outcome_helpers() {
        let ok = DownloadOutcome::Success {
            source: DownloadSource::Fallback {
                url: "https://repo1.maven.org/maven2".into(),
            },
            path: PathBuf::from("/tmp/a.jar"),
        };
        assert!(!ok.is_failure());
        assert!(ok.local_path().is_some());

        let failed = DownloadOutcome::Failed {
            message: "boom".into(),
        };
        assert!(failed.is_failure());
        assert!(failed.local_path().is_none());

        let missing = DownloadOutcome::SkippedNotFound {
            message: "404 everywhere".into(),
        };
        assert!(!missing.is_failure());
    }

    #[test]
    fn test_source_display() {
        let src = DownloadSource::DeclaredRemote {
            id: "corp".into(),
            url: "https://repo.corp.example/maven".into(),
        };
        assert!(src.to_string().contains("corp"));
    }
}
