//! Streaming asset downloader.
//!
//! Redirects are followed manually so the hop count can be bounded and
//! reported as a distinct error. The body is streamed straight to disk with
//! a sibling `<dest>.part` file with a progress callback per chunk. When an
//! expected hash is supplied the finished file is re-read and hashed. Only a
//! complete, verified file is renamed onto the destination; a failure
//! removes the partial file and leaves any earlier file at `dest` untouched.

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, LOCATION};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::integrity;
use crate::progress::{DownloadProgress, ProgressFn};

/// Maximum number of redirect hops before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Downloads release assets and their signatures.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl Downloader {
    /// Create a downloader using the timeouts and User-Agent from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            read_timeout: config.read_timeout(),
        })
    }

    /// Download `url` to `dest`, returning `dest` on success.
    ///
    /// `on_progress` is invoked once per received chunk with the cumulative
    /// byte count. If `expected_sha256` is given the written file is hashed
    /// and compared case-insensitively.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Network`] on connection failure or read timeout
    /// - [`UpdateError::Protocol`] on a non-2xx terminal status
    /// - [`UpdateError::Redirect`] on too many hops or a missing `Location`
    /// - [`UpdateError::Integrity`] on hash mismatch
    /// - [`UpdateError::Io`] if the destination cannot be written
    ///
    /// On every error the partial file is removed (best-effort) and `dest`
    /// keeps whatever it held before the call.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<ProgressFn<'_>>,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf> {
        let partial = partial_path(dest);
        let outcome = match self.fetch_to(url, &partial, on_progress, expected_sha256).await {
            Ok(()) => tokio::fs::rename(&partial, dest).await.map_err(|e| {
                UpdateError::Io(format!(
                    "cannot move {} to {}: {e}",
                    partial.display(),
                    dest.display()
                ))
            }),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                info!(url, path = %dest.display(), "download complete");
                Ok(dest.to_owned())
            }
            Err(e) => {
                remove_quietly(&partial).await;
                Err(e)
            }
        }
    }

    async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<ProgressFn<'_>>,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        let response = self.follow_redirects(url).await?;

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                UpdateError::Io(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| UpdateError::Io(format!("cannot create {}: {e}", dest.display())))?;

        let mut stream = response.bytes_stream();
        let mut transferred: u64 = 0;

        loop {
            let chunk = match timeout(self.read_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    return Err(UpdateError::Network(format!(
                        "download of {url} interrupted after {transferred} bytes: {e}"
                    )));
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(UpdateError::Network(format!(
                        "no data received for {}s while downloading {url} ({transferred} bytes so far)",
                        self.read_timeout.as_secs()
                    )));
                }
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::Io(format!("write to {} failed: {e}", dest.display())))?;
            transferred += chunk.len() as u64;

            if let Some(cb) = on_progress {
                cb(DownloadProgress::new(transferred, total));
            }
        }

        file.flush()
            .await
            .map_err(|e| UpdateError::Io(format!("flush of {} failed: {e}", dest.display())))?;
        drop(file);

        debug!(url, path = %dest.display(), bytes = transferred, "body received");

        if let Some(expected) = expected_sha256 {
            integrity::verify_sha256(dest, expected).await?;
        }
        Ok(())
    }

    /// Issue GET requests until a non-redirect response arrives.
    async fn follow_redirects(&self, url: &str) -> Result<reqwest::Response> {
        let mut current = url.to_owned();
        let mut hops = 0usize;

        loop {
            let response = timeout(self.read_timeout, self.client.get(&current).send())
                .await
                .map_err(|_| {
                    UpdateError::Network(format!(
                        "no response from {current} within {}s",
                        self.read_timeout.as_secs()
                    ))
                })?
                .map_err(|e| UpdateError::Network(format!("request to {current} failed: {e}")))?;

            let status = response.status();
            if is_redirect(status) {
                hops += 1;
                if hops > MAX_REDIRECTS {
                    return Err(UpdateError::Redirect(format!(
                        "too many redirects (more than {MAX_REDIRECTS}) starting at {url}"
                    )));
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        UpdateError::Redirect(format!(
                            "HTTP {} from {current} without a Location header",
                            status.as_u16()
                        ))
                    })?;
                let next = resolve_location(&current, location)?;
                debug!(hop = hops, from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(UpdateError::Protocol(format!(
                    "download of {current} failed with HTTP {}",
                    status.as_u16()
                )));
            }
            return Ok(response);
        }
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// `<dest>.part`, the file a download streams into before it is complete.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Resolve a possibly relative `Location` against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> Result<String> {
    let base = reqwest::Url::parse(base)
        .map_err(|e| UpdateError::Redirect(format!("invalid URL {base}: {e}")))?;
    base.join(location)
        .map(String::from)
        .map_err(|e| UpdateError::Redirect(format!("invalid Location {location:?}: {e}")))
}

/// Remove a file, ignoring "not found" and logging anything else.
pub(crate) async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove download"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn redirect_statuses() {
        assert!(is_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_redirect(StatusCode::FOUND));
        assert!(is_redirect(StatusCode::TEMPORARY_REDIRECT));
        assert!(is_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_redirect(StatusCode::SEE_OTHER));
        assert!(!is_redirect(StatusCode::OK));
    }

    #[test]
    fn relative_location_resolves_against_base() {
        let next = resolve_location("https://github.com/o/r/releases/download/v1/a.AppImage", "/cdn/a")
            .unwrap();
        assert_eq!(next, "https://github.com/cdn/a");
    }

    #[test]
    fn absolute_location_replaces_base() {
        let next = resolve_location("https://github.com/x", "https://objects.example.com/y").unwrap();
        assert_eq!(next, "https://objects.example.com/y");
    }

    #[test]
    fn invalid_base_is_redirect_error() {
        let err = resolve_location("not a url", "/x").unwrap_err();
        assert_eq!(err.code(), "REDIRECT_ERROR");
    }

    #[test]
    fn downloader_takes_read_timeout_from_config() {
        let mut config = UpdaterConfig::new("a/b");
        config.read_timeout_secs = 7;
        let downloader = Downloader::new(&config).unwrap();
        assert_eq!(downloader.read_timeout, Duration::from_secs(7));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/dl/App-2.0.0.AppImage")),
            PathBuf::from("/dl/App-2.0.0.AppImage.part")
        );
    }

    #[tokio::test]
    async fn remove_quietly_ignores_missing_file() {
        remove_quietly(Path::new("/nonexistent/forge-updater/file")).await;
    }
}
