//! Three-tier artifact resolution and the parallel download manager.

use crate::download::Downloader;
use crate::local::find_local;
use crate::retry::with_retry;
use crate::source::{DownloadOutcome, DownloadSource, RemoteRepo};
use dashmap::DashMap;
use pomscan_core::config::FetchConfig;
use pomscan_core::coordinate::{ArtifactCoordinate, Coordinate};
use pomscan_core::error::{ConfigError, FetchError, Result};
use pomscan_core::layout::{repo_relative_path, repo_url};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Resolves artifacts through local caches, project-declared remotes, and the
/// public fallback, in that order.
pub struct ArtifactFetcher {
    downloader: Downloader,
}

impl ArtifactFetcher {
    /// Validates the configuration and builds the HTTP client. Fatal on an
    /// unwritable local repository or invalid settings.
    pub fn new(config: FetchConfig) -> std::result::Result<Self, ConfigError> {
        let config = config.validate()?;
        Ok(Self {
            downloader: Downloader::new(config)?,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        self.downloader.config()
    }

    /// Resolves one artifact. Tiers are strictly sequential; the first
    /// success wins and later tiers are never consulted.
    pub async fn resolve_artifact(
        &self,
        artifact: &ArtifactCoordinate,
        repos: &[RemoteRepo],
        cancel: &AtomicBool,
    ) -> DownloadOutcome {
        let config = self.config();
        let coordinate = artifact.coordinate();

        // Tier 1: local caches. Never rolled back by cancellation.
        if let Some((source, path)) = find_local(config, artifact) {
            return DownloadOutcome::SkippedLocal { source, path };
        }

        let target = config.local_repo.join(repo_relative_path(coordinate));
        let mut hard_failures: Vec<String> = Vec::new();

        // Tier 2: project-declared remotes, skipping any that duplicate the
        // fallback's URL.
        for repo in repos
            .iter()
            .filter(|r| r.url.trim_end_matches('/') != config.fallback_url.trim_end_matches('/'))
        {
            if cancel.load(Ordering::SeqCst) {
                return DownloadOutcome::Failed {
                    message: format!("{artifact}: cancelled"),
                };
            }
            let url = repo_url(&repo.url, coordinate);
            let label = format!("{artifact} from '{}'", repo.id);
            match with_retry(&config.retry, cancel, &label, || {
                self.downloader.fetch_url(&url, &target)
            })
            .await
            {
                Ok(()) => {
                    return DownloadOutcome::Success {
                        source: DownloadSource::DeclaredRemote {
                            id: repo.id.clone(),
                            url: repo.url.clone(),
                        },
                        path: target.clone(),
                    };
                }
                Err(err) if err.is_not_found() => {
                    debug!(artifact = %artifact, repo = %repo.id, "not found, trying next repository");
                }
                Err(err) => {
                    warn!(artifact = %artifact, repo = %repo.id, error = %err, "download failed, trying next repository");
                    hard_failures.push(format!("'{}': {err}", repo.id));
                }
            }
        }

        // Tier 3: public fallback.
        if cancel.load(Ordering::SeqCst) {
            return DownloadOutcome::Failed {
                message: format!("{artifact}: cancelled"),
            };
        }
        let url = repo_url(&config.fallback_url, coordinate);
        let label = format!("{artifact} from fallback");
        match with_retry(&config.retry, cancel, &label, || {
            self.downloader.fetch_url(&url, &target)
        })
        .await
        {
            Ok(()) => DownloadOutcome::Success {
                source: DownloadSource::Fallback {
                    url: config.fallback_url.clone(),
                },
                path: target,
            },
            Err(err) if err.is_not_found() => DownloadOutcome::SkippedNotFound {
                message: format!("{artifact}: not present in any repository"),
            },
            Err(err) => {
                hard_failures.push(format!("fallback: {err}"));
                DownloadOutcome::Failed {
                    message: format!("{artifact}: {}", hard_failures.join("; ")),
                }
            }
        }
    }

    /// Retrieves the POM for a coordinate through the same tiering, placing
    /// it in the local repository. Used by the effective-model builder for
    /// parents, BOMs, and transitive POMs.
    pub async fn fetch_pom(&self, coordinate: &Coordinate, repos: &[RemoteRepo]) -> Result<PathBuf> {
        let pom_coordinate = Coordinate {
            classifier: None,
            extension: "pom".to_string(),
            ..coordinate.clone()
        };
        let artifact = ArtifactCoordinate::new(pom_coordinate)?;
        let cancel = AtomicBool::new(false);
        match self.resolve_artifact(&artifact, repos, &cancel).await {
            DownloadOutcome::Success { path, .. } | DownloadOutcome::SkippedLocal { path, .. } => {
                Ok(path)
            }
            DownloadOutcome::SkippedNotFound { message }
            | DownloadOutcome::Failed { message } => Err(FetchError::Unknown { message }),
        }
    }

    /// Acquires every artifact in the list, in parallel when enabled and the
    /// list is long enough to be worth spawning workers for.
    pub async fn fetch_all(
        self: &Arc<Self>,
        artifacts: Vec<ArtifactCoordinate>,
        repos: Vec<RemoteRepo>,
    ) -> FetchSummary {
        let config = self.config();
        let parallel = config.parallel && artifacts.len() > config.parallel_threshold;
        info!(
            artifacts = artifacts.len(),
            parallel, "starting artifact acquisition"
        );

        let outcomes = if parallel {
            self.fetch_parallel(artifacts, repos).await
        } else {
            self.fetch_sequential(artifacts, repos).await
        };

        let summary = FetchSummary::from_outcomes(outcomes);
        info!(
            succeeded = summary.succeeded,
            skipped_local = summary.skipped_local,
            not_found = summary.not_found,
            failed = summary.failed.len(),
            "artifact acquisition finished"
        );
        summary
    }

    /// Strictly sequential path: one artifact's failure never aborts its
    /// siblings.
    async fn fetch_sequential(
        &self,
        artifacts: Vec<ArtifactCoordinate>,
        repos: Vec<RemoteRepo>,
    ) -> Vec<(String, DownloadOutcome)> {
        let cancel = AtomicBool::new(false);
        let mut outcomes = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let outcome = self.resolve_artifact(&artifact, &repos, &cancel).await;
            outcomes.push((artifact.to_string(), outcome));
        }
        outcomes
    }

    /// Bounded worker pool with fail-fast cancellation: the first hard
    /// failure flips a shared flag that short-circuits queued work. Workers
    /// get a bounded drain window, then are aborted.
    async fn fetch_parallel(
        self: &Arc<Self>,
        artifacts: Vec<ArtifactCoordinate>,
        repos: Vec<RemoteRepo>,
    ) -> Vec<(String, DownloadOutcome)> {
        let config = self.config();
        let semaphore = Arc::new(Semaphore::new(config.pool_size));
        let cancel = Arc::new(AtomicBool::new(false));
        let results: Arc<DashMap<String, DownloadOutcome>> = Arc::new(DashMap::new());
        let repos = Arc::new(repos);
        let keys: Vec<String> = artifacts.iter().map(|a| a.to_string()).collect();

        let mut workers = JoinSet::new();
        for artifact in artifacts {
            let fetcher = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = Arc::clone(&cancel);
            let results = Arc::clone(&results);
            let repos = Arc::clone(&repos);
            workers.spawn(async move {
                let key = artifact.to_string();
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if cancel.load(Ordering::SeqCst) {
                    results.insert(
                        key,
                        DownloadOutcome::Failed {
                            message: format!("{artifact}: cancelled before start"),
                        },
                    );
                    return;
                }
                let outcome = fetcher.resolve_artifact(&artifact, &repos, &cancel).await;
                if outcome.is_failure() {
                    cancel.store(true, Ordering::SeqCst);
                }
                results.insert(key, outcome);
            });
        }

        let drained = tokio::time::timeout(config.overall_deadline, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("acquisition deadline exceeded, aborting remaining downloads");
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        keys.into_iter()
            .map(|key| {
                let outcome = results.remove(&key).map_or(
                    DownloadOutcome::Failed {
                        message: format!("{key}: overall deadline exceeded"),
                    },
                    |(_, outcome)| outcome,
                );
                (key, outcome)
            })
            .collect()
    }
}

/// Final per-run report. Missing artifacts are warnings; only hard failures
/// are listed with reasons.
pub struct FetchSummary {
    pub succeeded: usize,
    pub skipped_local: usize,
    pub not_found: usize,
    /// Coordinate and failure reason for each hard failure.
    pub failed: Vec<(String, String)>,
    pub outcomes: Vec<(String, DownloadOutcome)>,
}

impl FetchSummary {
    fn from_outcomes(outcomes: Vec<(String, DownloadOutcome)>) -> Self {
        let mut summary = Self {
            succeeded: 0,
            skipped_local: 0,
            not_found: 0,
            failed: Vec::new(),
            outcomes: Vec::new(),
        };
        for (key, outcome) in &outcomes {
            match outcome {
                DownloadOutcome::Success { .. } => summary.succeeded += 1,
                DownloadOutcome::SkippedLocal { .. } => summary.skipped_local += 1,
                DownloadOutcome::SkippedNotFound { .. } => summary.not_found += 1,
                DownloadOutcome::Failed { message } => {
                    summary.failed.push((key.clone(), message.clone()));
                }
            }
        }
        summary.outcomes = outcomes;
        summary
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "artifacts: {} downloaded, {} already local, {} not found, {} failed",
            self.succeeded,
            self.skipped_local,
            self.not_found,
            self.failed.len()
        )?;
        for (coordinate, reason) in &self.failed {
            writeln!(f, "  FAILED {coordinate}: {reason}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(name: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new(Coordinate::new("com.example", name, "1.0")).unwrap()
    }

    fn fetcher(dir: &TempDir, fallback: &str) -> Arc<ArtifactFetcher> {
        let config = FetchConfig {
            local_repo: dir.path().join("repo"),
            fallback_url: fallback.to_string(),
            retry: pomscan_core::config::RetryConfig {
                max_attempts: 2,
                initial_backoff: std::time::Duration::from_millis(1),
                max_backoff: std::time::Duration::from_millis(2),
            },
            ..FetchConfig::default()
        };
        Arc::new(ArtifactFetcher::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_local_hit_makes_no_network_call() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &server.url());
        let nested = fetcher.config().local_repo.join("com/example/lib/1.0");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("lib-1.0.jar"), b"cached").unwrap();

        let cancel = AtomicBool::new(false);
        let outcome = fetcher
            .resolve_artifact(&artifact("lib"), &[], &cancel)
            .await;
        assert!(matches!(outcome, DownloadOutcome::SkippedLocal { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_declared_repo_precedes_fallback() {
        let dir = TempDir::new().unwrap();
        let mut declared = mockito::Server::new_async().await;
        let mut fallback = mockito::Server::new_async().await;

        let declared_mock = declared
            .mock("GET", "/com/example/lib/1.0/lib-1.0.jar")
            .with_status(200)
            .with_body("from-declared")
            .create_async()
            .await;
        let fallback_mock = fallback
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &fallback.url());
        let repos = vec![RemoteRepo::new("corp", &declared.url())];
        let cancel = AtomicBool::new(false);
        let outcome = fetcher
            .resolve_artifact(&artifact("lib"), &repos, &cancel)
            .await;

        assert!(matches!(
            outcome,
            DownloadOutcome::Success {
                source: DownloadSource::DeclaredRemote { .. },
                ..
            }
        ));
        declared_mock.assert_async().await;
        fallback_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_404_moves_to_fallback_without_retrying() {
        let dir = TempDir::new().unwrap();
        let mut declared = mockito::Server::new_async().await;
        let mut fallback = mockito::Server::new_async().await;

        // exactly one request despite max_attempts = 2
        let declared_mock = declared
            .mock("GET", "/com/example/lib/1.0/lib-1.0.jar")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let fallback_mock = fallback
            .mock("GET", "/com/example/lib/1.0/lib-1.0.jar")
            .with_status(200)
            .with_body("from-fallback")
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &fallback.url());
        let repos = vec![RemoteRepo::new("corp", &declared.url())];
        let cancel = AtomicBool::new(false);
        let outcome = fetcher
            .resolve_artifact(&artifact("lib"), &repos, &cancel)
            .await;

        assert!(matches!(
            outcome,
            DownloadOutcome::Success {
                source: DownloadSource::Fallback { .. },
                ..
            }
        ));
        declared_mock.assert_async().await;
        fallback_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_all_404_is_skipped_not_found() {
        let dir = TempDir::new().unwrap();
        let mut fallback = mockito::Server::new_async().await;
        fallback
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &fallback.url());
        let cancel = AtomicBool::new(false);
        let outcome = fetcher
            .resolve_artifact(&artifact("lib"), &[], &cancel)
            .await;
        assert!(matches!(outcome, DownloadOutcome::SkippedNotFound { .. }));
    }

    #[tokio::test]
    async fn test_declared_repo_deduplicated_against_fallback() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        // one request total: the declared entry duplicating the fallback URL
        // is dropped, leaving only the fallback tier
        let mock = server
            .mock("GET", "/com/example/lib/1.0/lib-1.0.jar")
            .with_status(200)
            .with_body("bytes")
            .expect(1)
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &server.url());
        let repos = vec![RemoteRepo::new("duplicate-of-central", &server.url())];
        let cancel = AtomicBool::new(false);
        let outcome = fetcher
            .resolve_artifact(&artifact("lib"), &repos, &cancel)
            .await;
        assert!(matches!(
            outcome,
            DownloadOutcome::Success {
                source: DownloadSource::Fallback { .. },
                ..
            }
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_pom_lands_in_local_repo() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/com/example/lib/1.0/lib-1.0.pom")
            .with_status(200)
            .with_body("<project/>")
            .create_async()
            .await;

        let fetcher = fetcher(&dir, &server.url());
        let path = fetcher
            .fetch_pom(&Coordinate::new("com.example", "lib", "1.0"), &[])
            .await
            .unwrap();
        assert!(path.ends_with("com/example/lib/1.0/lib-1.0.pom"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<project/>");
    }

    #[tokio::test]
    async fn test_parallel_cancellation_stops_new_downloads() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        // 403 is a hard, non-retryable failure
        let first = server
            .mock("GET", "/com/example/bad/1.0/bad-1.0.jar")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;
        let others = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"/com/example/ok\d/1\.0/.*".to_string()),
            )
            .with_status(200)
            .with_body("bytes")
            .expect(0)
            .create_async()
            .await;

        let config = FetchConfig {
            local_repo: dir.path().join("repo"),
            fallback_url: server.url(),
            pool_size: 1,
            parallel_threshold: 0,
            retry: pomscan_core::config::RetryConfig {
                max_attempts: 1,
                initial_backoff: std::time::Duration::from_millis(1),
                max_backoff: std::time::Duration::from_millis(2),
            },
            ..FetchConfig::default()
        };
        let fetcher = Arc::new(ArtifactFetcher::new(config).unwrap());

        let artifacts = vec![
            artifact("bad"),
            artifact("ok1"),
            artifact("ok2"),
            artifact("ok3"),
        ];
        let summary = fetcher.fetch_all(artifacts, vec![]).await;

        // with a single worker, ordering is FIFO: the failure lands first and
        // every queued artifact is cancelled before touching the network
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed.len(), 4);
        first.assert_async().await;
        others.assert_async().await;
    }

    #[tokio::test]
    async fn test_sequential_failures_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/com/example/bad/1.0/bad-1.0.jar")
            .with_status(403)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/com/example/ok1/1.0/ok1-1.0.jar")
            .with_status(200)
            .with_body("bytes")
            .expect(1)
            .create_async()
            .await;

        let config = FetchConfig {
            local_repo: dir.path().join("repo"),
            fallback_url: server.url(),
            parallel: false,
            retry: pomscan_core::config::RetryConfig {
                max_attempts: 1,
                initial_backoff: std::time::Duration::from_millis(1),
                max_backoff: std::time::Duration::from_millis(2),
            },
            ..FetchConfig::default()
        };
        let fetcher = Arc::new(ArtifactFetcher::new(config).unwrap());
        let summary = fetcher
            .fetch_all(vec![artifact("bad"), artifact("ok1")], vec![])
            .await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed.len(), 1);
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_summary_display_lists_failures() {
        let summary = FetchSummary::from_outcomes(vec![
            (
                "com.example:a:1.0".into(),
                DownloadOutcome::Failed {
                    message: "boom".into(),
                },
            ),
            (
                "com.example:b:1.0".into(),
                DownloadOutcome::SkippedNotFound {
                    message: "404".into(),
                },
            ),
        ]);
        let text = summary.to_string();
        assert!(text.contains("1 failed"));
        assert!(text.contains("com.example:a:1.0"));
        assert_eq!(summary.total(), 2);
    }
}
