//! HTTP download mechanics shared by the remote tiers.
//!
//! One attempt = one call to [`Downloader::fetch_url`]. Resume state lives in
//! a `<target>.partial` sidecar that is only promoted to the final path by a
//! same-directory rename once the byte count checks out.

use pomscan_core::config::FetchConfig;
use pomscan_core::error::{ConfigError, FetchError, Result};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub struct Downloader {
    client: Client,
    config: FetchConfig,
}

impl Downloader {
    pub fn new(config: FetchConfig) -> std::result::Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Downloads `url` to `target`, resuming a usable `.partial` sidecar.
    ///
    /// A server that ignores the resume request in an unexpected way costs
    /// one fresh-download fallback, not the whole attempt.
    pub async fn fetch_url(&self, url: &str, target: &Path) -> Result<()> {
        match self.fetch_once(url, target, true).await {
            Err(FetchError::RangeNotSupported { .. }) => {
                warn!(url, "resume rejected, restarting fresh download");
                let _ = tokio::fs::remove_file(partial_path(target)).await;
                self.fetch_once(url, target, false).await
            }
            other => other,
        }
    }

    async fn fetch_once(&self, url: &str, target: &Path, allow_resume: bool) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_err(parent, &e))?;
        }

        let partial = partial_path(target);
        let mut resume_from = if allow_resume {
            self.resumable_bytes(&partial)
        } else {
            0
        };

        let mut request = self.client.get(url);
        if resume_from > 0 {
            request = request.header(RANGE, format!("bytes={resume_from}-"));
        }
        let response = request.send().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::OK && resume_from > 0 {
            // Server ignored the range request; drop the partial and take the
            // full body it is already sending.
            debug!(url, "server replied 200 to range request, discarding partial");
            resume_from = 0;
        } else if status == StatusCode::PARTIAL_CONTENT {
            let start = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range)
                .map(|(start, _)| start);
            if start != Some(resume_from) {
                return Err(FetchError::RangeNotSupported {
                    url: url.to_string(),
                });
            }
        } else if !status.is_success() {
            return Err(FetchError::Repository {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected_total = expected_total_bytes(&response, resume_from);

        if let Some(total) = expected_total {
            self.check_disk_space(target, total.saturating_sub(resume_from))?;
        }

        let written = self
            .stream_to_partial(url, response, &partial, resume_from)
            .await?;
        let final_size = resume_from + written;

        if let Some(total) = expected_total
            && final_size != total
        {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(FetchError::PartialDownload {
                path: partial.display().to_string(),
                message: format!("short read: got {final_size} of {total} bytes"),
            });
        }

        tokio::fs::rename(&partial, target)
            .await
            .map_err(|e| fs_err(target, &e))?;
        debug!(url, bytes = final_size, path = %target.display(), "download complete");
        Ok(())
    }

    async fn stream_to_partial(
        &self,
        url: &str,
        mut response: Response,
        partial: &Path,
        resume_from: u64,
    ) -> Result<u64> {
        let mut file = if resume_from > 0 {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(partial)
                .await
        } else {
            tokio::fs::File::create(partial).await
        }
        .map_err(|e| fs_err(partial, &e))?;

        let mut written: u64 = 0;
        loop {
            let chunk = response.chunk().await.map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk)
                .await
                .map_err(|e| fs_err(partial, &e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| fs_err(partial, &e))?;
        Ok(written)
    }

    /// Size of a resumable sidecar, or 0 when it must be started fresh.
    fn resumable_bytes(&self, partial: &Path) -> u64 {
        let Ok(meta) = partial.metadata() else {
            return 0;
        };
        if meta.len() == 0 {
            let _ = std::fs::remove_file(partial);
            return 0;
        }
        let fresh = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .is_some_and(|age| age < self.config.partial_stale_age);
        if !fresh {
            debug!(path = %partial.display(), "discarding stale partial download");
            let _ = std::fs::remove_file(partial);
            return 0;
        }
        // Must be both readable and appendable to resume.
        if std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(partial)
            .is_err()
        {
            warn!(path = %partial.display(), "partial file not read/writable, starting fresh");
            let _ = std::fs::remove_file(partial);
            return 0;
        }
        debug!(path = %partial.display(), bytes = meta.len(), "resuming partial download");
        meta.len()
    }

    fn check_disk_space(&self, target: &Path, incoming: u64) -> Result<()> {
        let dir = target.parent().unwrap_or(Path::new("."));
        let needed = incoming.saturating_add(self.config.disk_safety_margin);
        match fs4::available_space(dir) {
            Ok(available) if available < needed => Err(FetchError::InsufficientDiskSpace {
                path: dir.display().to_string(),
                needed,
                available,
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                // Preflight is advisory; a broken statvfs should not block
                // the download itself.
                warn!(path = %dir.display(), error = %e, "disk space check unavailable");
                Ok(())
            }
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.push_str(".partial");
    target.with_file_name(name)
}

fn fs_err(path: &Path, e: &std::io::Error) -> FetchError {
    FetchError::FileSystem {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Parses `bytes <start>-<end>/<total>`; total may be `*`.
fn parse_content_range(value: &str) -> Option<(u64, Option<u64>)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, _end) = range.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let total = total.trim().parse().ok();
    Some((start, total))
}

fn expected_total_bytes(response: &Response, resume_from: u64) -> Option<u64> {
    if response.status() == StatusCode::PARTIAL_CONTENT {
        let header_total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .and_then(|(_, total)| total);
        header_total.or_else(|| response.content_length().map(|len| resume_from + len))
    } else {
        response.content_length()
    }
}
