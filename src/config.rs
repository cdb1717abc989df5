//! Updater configuration.
//!
//! [`UpdaterConfig`] is resolved once when the updater is built: user
//! supplied fields are merged over defaults (`#[serde(default)]` for TOML,
//! `with_*` setters in code) and then validated. An invalid repository
//! identifier fails construction before any network access happens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, UpdateError};
use crate::platform::Platform;

/// Channel value that disables tag filtering.
pub const LATEST_CHANNEL: &str = "latest";

/// Default GitHub REST API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Pluggable sink for the human-readable messages the updater produces.
///
/// The default implementation, [`TracingLogger`], forwards to `tracing`.
pub trait UpdateLogger: Send + Sync {
    /// Informational message.
    fn info(&self, message: &str);
    /// Something unexpected that did not stop the operation.
    fn warn(&self, message: &str);
    /// A terminal failure.
    fn error(&self, message: &str);
    /// Verbose diagnostics, only used when `debug` is enabled.
    fn debug(&self, message: &str) {
        let _ = message;
    }
}

/// Logger that forwards every message to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl UpdateLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

fn default_logger() -> Arc<dyn UpdateLogger> {
    Arc::new(TracingLogger)
}

/// Session configuration for an [`Updater`](crate::update::Updater).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// GitHub repository in the form `owner/name`.
    pub repo: String,
    /// Start a download automatically when a check finds an update.
    pub auto_download: bool,
    /// Consider releases flagged as prereleases.
    pub allow_prerelease: bool,
    /// Only accept tags containing this substring. `"latest"` disables filtering.
    pub channel: String,
    /// Emit verbose debug messages and forward them to the host.
    pub debug: bool,
    /// REST API root (override for GitHub Enterprise or tests).
    pub api_base_url: String,
    /// Directory downloads are written to. Defaults to the OS temp dir.
    pub download_dir: Option<PathBuf>,
    /// Keyring passed to the signature verifier.
    pub gpg_keyring: Option<PathBuf>,
    /// Platform override. Defaults to the running OS.
    pub platform: Option<Platform>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum silence between response chunks in seconds.
    pub read_timeout_secs: u64,
    /// Upper bound for the signature verification subprocess in seconds.
    pub verify_timeout_secs: u64,
    /// User-Agent sent with every request (GitHub rejects requests without one).
    pub user_agent: String,
    /// Message sink.
    #[serde(skip, default = "default_logger")]
    pub logger: Arc<dyn UpdateLogger>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            auto_download: true,
            allow_prerelease: false,
            channel: LATEST_CHANNEL.to_owned(),
            debug: false,
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            download_dir: None,
            gpg_keyring: None,
            platform: None,
            connect_timeout_secs: 15,
            read_timeout_secs: 300,
            verify_timeout_secs: 120,
            user_agent: format!("forge-updater/{}", env!("CARGO_PKG_VERSION")),
            logger: default_logger(),
        }
    }
}

impl fmt::Debug for UpdaterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdaterConfig")
            .field("repo", &self.repo)
            .field("auto_download", &self.auto_download)
            .field("allow_prerelease", &self.allow_prerelease)
            .field("channel", &self.channel)
            .field("debug", &self.debug)
            .field("api_base_url", &self.api_base_url)
            .field("download_dir", &self.download_dir)
            .field("gpg_keyring", &self.gpg_keyring)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl UpdaterConfig {
    /// Create a config for `repo` with every other field at its default.
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// Enable or disable automatic download after a successful check.
    pub fn with_auto_download(mut self, enabled: bool) -> Self {
        self.auto_download = enabled;
        self
    }

    /// Allow prerelease versions.
    pub fn with_prerelease(mut self, allowed: bool) -> Self {
        self.allow_prerelease = allowed;
        self
    }

    /// Restrict releases to tags containing `channel`.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Enable verbose debug output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set a custom API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the download directory.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Set the keyring used for signature verification.
    pub fn with_gpg_keyring(mut self, keyring: impl Into<PathBuf>) -> Self {
        self.gpg_keyring = Some(keyring.into());
        self
    }

    /// Pin the platform instead of detecting it.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Arc<dyn UpdateLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Parse a TOML document, merging its fields over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UpdateError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `repo` has exactly one `/` and both halves are non-empty
    /// - `channel` is not empty
    /// - all timeouts are greater than 0
    pub fn validate(&self) -> Result<()> {
        let parts: Vec<&str> = self.repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(UpdateError::Config(format!(
                "invalid repository format {:?}, expected \"owner/repo\"",
                self.repo
            )));
        }
        if self.channel.is_empty() {
            return Err(UpdateError::Config(
                "channel must not be empty (use \"latest\" to disable filtering)".into(),
            ));
        }
        if self.connect_timeout_secs == 0
            || self.read_timeout_secs == 0
            || self.verify_timeout_secs == 0
        {
            return Err(UpdateError::Config("timeouts must be greater than 0".into()));
        }
        Ok(())
    }

    /// Platform the updater operates on.
    pub fn effective_platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    /// Directory downloads are written to.
    pub fn effective_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Whether channel filtering is active.
    pub fn filters_channel(&self) -> bool {
        self.channel != LATEST_CHANNEL
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub(crate) fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub(crate) fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = UpdaterConfig::default();
        assert!(config.auto_download);
        assert!(!config.allow_prerelease);
        assert_eq!(config.channel, "latest");
        assert!(!config.debug);
        assert_eq!(config.api_base_url, "https://api.github.com");
        assert_eq!(config.connect_timeout_secs, 15);
        assert_eq!(config.read_timeout_secs, 300);
        assert!(config.user_agent.starts_with("forge-updater/"));
        assert!(!config.filters_channel());
    }

    #[test]
    fn valid_repo_passes() {
        assert!(UpdaterConfig::new("test/repo").validate().is_ok());
    }

    #[test]
    fn repo_without_separator_rejected() {
        let err = UpdaterConfig::new("invalid-repo-format").validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
        assert!(err.message().contains("invalid repository format"));
    }

    #[test]
    fn repo_with_two_separators_rejected() {
        assert!(UpdaterConfig::new("a/b/c").validate().is_err());
    }

    #[test]
    fn repo_with_empty_half_rejected() {
        assert!(UpdaterConfig::new("owner/").validate().is_err());
        assert!(UpdaterConfig::new("/repo").validate().is_err());
        assert!(UpdaterConfig::new("").validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = UpdaterConfig {
            read_timeout_secs: 0,
            ..UpdaterConfig::new("a/b")
        };
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("timeouts"));
    }

    #[test]
    fn empty_channel_rejected() {
        let config = UpdaterConfig::new("a/b").with_channel("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_setters_apply() {
        let config = UpdaterConfig::new("test/repo")
            .with_auto_download(false)
            .with_prerelease(true)
            .with_channel("beta")
            .with_debug(true)
            .with_platform(Platform::Linux)
            .with_download_dir("/tmp/forge-updater-test");
        assert!(!config.auto_download);
        assert!(config.allow_prerelease);
        assert!(config.filters_channel());
        assert!(config.debug);
        assert_eq!(config.effective_platform(), Platform::Linux);
        assert_eq!(
            config.effective_download_dir(),
            PathBuf::from("/tmp/forge-updater-test")
        );
    }

    #[test]
    fn partial_toml_merges_over_defaults() {
        let config = UpdaterConfig::from_toml_str(
            r#"
repo = "owner/app"
channel = "beta"
platform = "linux"
"#,
        )
        .unwrap();
        assert_eq!(config.repo, "owner/app");
        assert_eq!(config.channel, "beta");
        assert_eq!(config.platform, Some(Platform::Linux));
        assert!(config.auto_download);
        assert_eq!(config.read_timeout_secs, 300);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = UpdaterConfig::from_toml_str("this is not valid toml {{{").unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = UpdaterConfig::from_file(Path::new("/nonexistent/path/updater.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_omits_logger() {
        let rendered = format!("{:?}", UpdaterConfig::new("a/b"));
        assert!(rendered.contains("a/b"));
        assert!(!rendered.contains("logger"));
    }
}
