use pomscan_core::config::FetchConfig;
use pomscan_fetch::ArtifactFetcher;
use pomscan_pom::{ModuleTreeProcessor, NullSink, ScanConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let project_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
    let Some(root_pom) = find_root_pom(&project_dir) else {
        error!(dir = %project_dir.display(), "no pom.xml found");
        return ExitCode::FAILURE;
    };

    // an unwritable local repository means no useful work can happen
    let fetcher = match ArtifactFetcher::new(FetchConfig::default()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            error!(error = %err, "configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    let scan_config = ScanConfig {
        dump_dir: Some(project_dir.join("target").join("pomscan")),
        ..ScanConfig::default()
    };
    let processor = ModuleTreeProcessor::new(&fetcher, scan_config);
    let report = match processor.process(&root_pom, &mut NullSink).await {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "project could not be read");
            return ExitCode::FAILURE;
        }
    };

    info!(
        modules = report.visited.len(),
        failed = report.failed.len(),
        artifacts = report.artifacts.len(),
        "scan complete"
    );
    for failed in &report.failed {
        warn!(path = %failed.path.display(), reason = %failed.reason, "module failed");
    }

    let repos = report.remote_repos();
    let summary = fetcher.fetch_all(report.artifacts, repos).await;
    println!("{summary}");

    // missing artifacts are warnings, not a process failure
    ExitCode::SUCCESS
}

fn find_root_pom(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join("pom.xml");
    candidate.is_file().then_some(candidate)
}
