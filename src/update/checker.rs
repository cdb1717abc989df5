//! GitHub release checker.
//!
//! Fetches the full release list for a repository (single page, newest
//! first), drops drafts, prereleases and off-channel tags, and normalizes the
//! first surviving release into an [`UpdateInfo`]. Whether that release is
//! actually newer than the running app is decided separately with
//! [`is_newer`], using semver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};

// ── Raw API schema ────────────────────────────────────────────

/// A release object as returned by `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    /// Tag name (e.g. `"v2.0.0"`).
    pub tag_name: String,
    /// Release title. GitHub returns `null` when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Release notes (markdown). May be `null`.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    /// Publication timestamp. `null` for drafts.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// A release asset, including the non-standard hash/signature extension fields.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    /// Expected SHA-256 hex digest, when the publisher injects one.
    #[serde(default)]
    pub sha256: Option<String>,
    /// URL of a detached signature for this asset.
    #[serde(default, rename = "gpgSignatureUrl", alias = "signature_url")]
    pub signature_url: Option<String>,
}

// ── Normalized descriptors ────────────────────────────────────

/// A single downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetInfo {
    /// File name (e.g. `"App-2.0.0.AppImage"`).
    pub name: String,
    /// Direct download URL.
    pub url: String,
    /// Size in bytes as reported by the API (0 if absent).
    pub size: u64,
    /// Expected SHA-256 hex digest.
    pub sha256: Option<String>,
    /// Detached signature URL.
    pub signature_url: Option<String>,
}

/// Normalized snapshot of the release an update would install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    /// Version string, taken verbatim from the tag.
    pub version: String,
    /// Human-readable release title.
    pub release_name: String,
    /// Release notes body.
    pub release_notes: String,
    /// When the release was published, if known.
    pub published_at: Option<DateTime<Utc>>,
    /// Assets in API order.
    pub assets: Vec<AssetInfo>,
}

impl From<GitHubAsset> for AssetInfo {
    fn from(a: GitHubAsset) -> Self {
        Self {
            name: a.name,
            url: a.browser_download_url,
            size: a.size,
            sha256: a.sha256.filter(|h| !h.trim().is_empty()),
            signature_url: a.signature_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

impl From<GitHubRelease> for UpdateInfo {
    fn from(r: GitHubRelease) -> Self {
        Self {
            release_name: r.name.unwrap_or_else(|| r.tag_name.clone()),
            version: r.tag_name,
            release_notes: r.body.unwrap_or_default(),
            published_at: r.published_at,
            assets: r.assets.into_iter().map(AssetInfo::from).collect(),
        }
    }
}

// ── Filtering and version comparison ──────────────────────────

/// Pick the newest release allowed by the draft/prerelease/channel policy.
///
/// Releases are expected newest-first (GitHub API order); the first entry
/// that survives filtering wins. With `channel` set, the tag must contain it.
pub fn select_release(
    releases: Vec<GitHubRelease>,
    allow_prerelease: bool,
    channel: Option<&str>,
) -> Option<UpdateInfo> {
    releases
        .into_iter()
        .filter(|r| !r.draft)
        .filter(|r| allow_prerelease || !r.prerelease)
        .find(|r| channel.is_none_or(|c| r.tag_name.contains(c)))
        .map(UpdateInfo::from)
}

/// Parse a tag or version string as semver, tolerating a leading `v`.
pub fn parse_version(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    semver::Version::parse(stripped).ok()
}

/// `true` only when both versions are valid semver and `candidate > current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_version(candidate), parse_version(current)) {
        (Some(c), Some(r)) => c > r,
        _ => false,
    }
}

// ── Checker ───────────────────────────────────────────────────

/// Resolves the latest eligible release of a repository.
pub struct ReleaseChecker {
    client: reqwest::Client,
    releases_url: String,
    allow_prerelease: bool,
    channel: Option<String>,
    read_timeout: std::time::Duration,
}

impl std::fmt::Debug for ReleaseChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseChecker")
            .field("releases_url", &self.releases_url)
            .field("allow_prerelease", &self.allow_prerelease)
            .field("channel", &self.channel)
            .finish()
    }
}

impl ReleaseChecker {
    /// Create a checker for the repository in `config`.
    pub fn new(client: reqwest::Client, config: &UpdaterConfig) -> Self {
        Self {
            client,
            releases_url: releases_url(&config.api_base_url, &config.repo),
            allow_prerelease: config.allow_prerelease,
            channel: config.filters_channel().then(|| config.channel.clone()),
            read_timeout: config.read_timeout(),
        }
    }

    /// Fetch the release list and return the first eligible release.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Network`] on transport failure or timeout
    /// - [`UpdateError::Protocol`] on a non-success status or malformed JSON
    /// - [`UpdateError::Format`] if the body is not a JSON array
    pub async fn resolve_latest(&self) -> Result<Option<UpdateInfo>> {
        debug!(url = %self.releases_url, "fetching release list");

        let response = self
            .client
            .get(&self.releases_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| {
                UpdateError::Network(format!("error accessing {}: {e}", self.releases_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdateError::Protocol(format!(
                "release API returned HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&body)
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdateError::Network(format!("error reading release list: {e}")))?;

        let releases = parse_release_list(&body)?;
        let total = releases.len();
        let selected = select_release(releases, self.allow_prerelease, self.channel.as_deref());

        match &selected {
            Some(info) => info!(
                total,
                version = %info.version,
                assets = info.assets.len(),
                "latest eligible release resolved"
            ),
            None => info!(total, channel = ?self.channel, "no eligible release"),
        }
        Ok(selected)
    }
}

/// Build `<base>/repos/<owner>/<name>/releases`.
pub fn releases_url(api_base_url: &str, repo: &str) -> String {
    format!("{}/repos/{repo}/releases", api_base_url.trim_end_matches('/'))
}

/// Parse a release-list body, distinguishing bad JSON from a non-array shape.
pub fn parse_release_list(body: &str) -> Result<Vec<GitHubRelease>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| UpdateError::Protocol(format!("invalid JSON from release API: {e}")))?;
    if !value.is_array() {
        return Err(UpdateError::Format(
            "release API did not return an array".into(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| UpdateError::Protocol(format!("unexpected release schema: {e}")))
}

/// Extract `message` from a GitHub error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
