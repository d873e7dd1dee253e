//! Local tier: custom path and default repository cache lookups.

use crate::source::DownloadSource;
use pomscan_core::config::FetchConfig;
use pomscan_core::coordinate::ArtifactCoordinate;
use pomscan_core::layout::repo_relative_path;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Looks the artifact up in the custom path (if configured) and then the
/// default local repository. Returns the first usable hit.
pub fn find_local(
    config: &FetchConfig,
    artifact: &ArtifactCoordinate,
) -> Option<(DownloadSource, PathBuf)> {
    let coordinate = artifact.coordinate();
    let relative = repo_relative_path(coordinate);

    if let Some(custom) = &config.custom_repo {
        // Either a flat directory of jars with the exact expected name, or a
        // directory in repository layout.
        let flat = custom.join(coordinate.file_name());
        if usable_file(&flat) {
            debug!(artifact = %artifact, path = %flat.display(), "found in custom path");
            return Some((DownloadSource::LocalCustom { path: custom.clone() }, flat));
        }
        let layered = custom.join(&relative);
        if usable_file(&layered) {
            debug!(artifact = %artifact, path = %layered.display(), "found in custom path");
            return Some((DownloadSource::LocalCustom { path: custom.clone() }, layered));
        }
    }

    let cached = config.local_repo.join(&relative);
    if usable_file(&cached) {
        debug!(artifact = %artifact, path = %cached.display(), "found in local repository");
        return Some((
            DownloadSource::LocalDefault {
                path: config.local_repo.clone(),
            },
            cached,
        ));
    }

    None
}

/// A present-but-unreadable or zero-byte file is a miss, not a failure.
fn usable_file(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    if meta.len() == 0 {
        warn!(path = %path.display(), "ignoring zero-byte artifact file");
        return false;
    }
    if File::open(path).is_err() {
        warn!(path = %path.display(), "ignoring unreadable artifact file");
        return false;
    }
    true
}
