//! Update controller.
//!
//! [`Updater`] sequences the pipeline stages (resolve, select, download,
//! verify, dispatch) behind three operations that callers invoke
//! separately. Session state is threaded between them through
//! [`SessionState`], and every lifecycle step is broadcast as an
//! [`UpdateEvent`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::platform::Platform;
use crate::progress::{DownloadProgress, ProgressFn};
use crate::update::applier::{self, ApplyResult, Launcher, SystemLauncher};
use crate::update::asset::select_asset;
use crate::update::checker::{ReleaseChecker, UpdateInfo, is_newer};
use crate::update::downloader::{Downloader, remove_quietly};
use crate::update::events::{EVENT_CHANNEL_CAPACITY, UpdateEvent};
use crate::update::host::{HostEnvironment, StandaloneHost};
use crate::update::signature::{GpgVerifier, SignatureVerifier};
use crate::update::state::SessionState;

/// Builder for [`Updater`] that lets embedders swap the external
/// collaborators.
pub struct UpdaterBuilder {
    config: UpdaterConfig,
    host: Option<Arc<dyn HostEnvironment>>,
    launcher: Option<Arc<dyn Launcher>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl UpdaterBuilder {
    /// Start from `config`.
    pub fn new(config: UpdaterConfig) -> Self {
        Self {
            config,
            host: None,
            launcher: None,
            verifier: None,
        }
    }

    /// Application the updater is embedded in. Defaults to [`StandaloneHost`].
    pub fn host(mut self, host: impl HostEnvironment + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Process launcher used by apply. Defaults to [`SystemLauncher`].
    pub fn launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Detached signature verifier. Defaults to [`GpgVerifier`].
    pub fn verifier(mut self, verifier: impl SignatureVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Validate the configuration and build the controller.
    ///
    /// No network access happens here.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the configuration is invalid or an
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<Updater> {
        self.config.validate()?;

        let api_client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout())
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Config(format!("failed to build HTTP client: {e}")))?;

        let checker = ReleaseChecker::new(api_client, &self.config);
        let downloader = Downloader::new(&self.config)?;
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(GpgVerifier::new(self.config.verify_timeout())));
        let launcher = self.launcher.unwrap_or_else(|| Arc::new(SystemLauncher));
        let host = self.host.unwrap_or_else(|| Arc::new(StandaloneHost));
        let platform = self.config.effective_platform();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        if !platform.is_supported() {
            tracing::warn!(%platform, "no install strategy for this platform, apply will fail");
        }

        tracing::debug!(
            repo = %self.config.repo,
            platform = %platform,
            host = host.name(),
            "updater created"
        );

        Ok(Updater {
            inner: Arc::new(Inner {
                config: self.config,
                platform,
                checker,
                downloader,
                verifier,
                launcher,
                host,
                events,
                session: Mutex::new(SessionState::default()),
                auto_download: Mutex::new(None),
            }),
        })
    }
}

struct Inner {
    config: UpdaterConfig,
    platform: Platform,
    checker: ReleaseChecker,
    downloader: Downloader,
    verifier: Arc<dyn SignatureVerifier>,
    launcher: Arc<dyn Launcher>,
    host: Arc<dyn HostEnvironment>,
    events: broadcast::Sender<UpdateEvent>,
    session: Mutex<SessionState>,
    auto_download: Mutex<Option<JoinHandle<Result<PathBuf>>>>,
}

/// Self-update controller. Cheap to clone; clones share one session.
///
/// Calls are expected to be made in order (check, download, apply). The
/// session slots are lock-protected but concurrent calls are not serialized
/// against each other.
#[derive(Clone)]
pub struct Updater {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("repo", &self.inner.config.repo)
            .field("platform", &self.inner.platform)
            .field("host", &self.inner.host.name())
            .finish()
    }
}

impl Updater {
    /// Build an updater with the default collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if `config` is invalid.
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        UpdaterBuilder::new(config).build()
    }

    /// Start a builder.
    pub fn builder(config: UpdaterConfig) -> UpdaterBuilder {
        UpdaterBuilder::new(config)
    }

    /// Receive lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.events.subscribe()
    }

    /// Effective configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.inner.config
    }

    /// Platform used for asset selection and installer dispatch.
    pub fn platform(&self) -> &Platform {
        &self.inner.platform
    }

    /// Snapshot of the session slots.
    pub fn session(&self) -> SessionState {
        self.lock_session().clone()
    }

    /// Take the handle of the download started by `auto_download`, if any.
    pub fn take_auto_download(&self) -> Option<JoinHandle<Result<PathBuf>>> {
        self.inner
            .auto_download
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Look for a release newer than the running application.
    ///
    /// Failures never propagate: they are logged, broadcast as
    /// [`UpdateEvent::Error`] and reported as `None`. With `auto_download`
    /// set, an available update starts a background download; this call
    /// does not wait for it.
    pub async fn check_for_updates(&self) -> Option<UpdateInfo> {
        self.inner.config.logger.info("Checking for updates...");
        self.emit(UpdateEvent::CheckingForUpdate);

        let resolved = match self.inner.checker.resolve_latest().await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.fail("Update check failed", e);
                return None;
            }
        };

        let current = self.inner.host.app_version();
        let available = resolved.filter(|info| {
            let newer = is_newer(&info.version, &current);
            if !newer {
                self.debug(&format!(
                    "release {} is not newer than running version {current}",
                    info.version
                ));
            }
            newer
        });
        self.lock_session().record_check(available.clone());

        let Some(info) = available else {
            self.emit(UpdateEvent::UpdateNotAvailable);
            self.inner.config.logger.info("No update available.");
            return None;
        };

        self.emit(UpdateEvent::UpdateAvailable(info.clone()));
        self.inner
            .config
            .logger
            .info(&format!("Update available: {}", info.version));

        if self.inner.config.auto_download {
            self.spawn_auto_download();
        }
        Some(info)
    }

    /// Download and verify the platform asset of the last available update.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Precondition`] without a prior available check, or
    ///   when no asset matches the platform
    /// - any downloader error ([`UpdateError::Network`], `Protocol`,
    ///   `Redirect`, `Integrity`, `Io`)
    /// - [`UpdateError::Signature`] if the detached signature is rejected
    ///
    /// Every error is also broadcast as [`UpdateEvent::Error`].
    pub async fn download_update(&self) -> Result<PathBuf> {
        self.inner.config.logger.info("Downloading update...");
        match self.try_download().await {
            Ok(path) => {
                self.lock_session().record_download(path.clone());
                self.emit(UpdateEvent::Downloaded(path.clone()));
                self.inner
                    .config
                    .logger
                    .info(&format!("Downloaded update to: {}", path.display()));
                Ok(path)
            }
            Err(e) => {
                // A failed signature check deletes the file at the destination,
                // which may be the one recorded by an earlier download.
                self.lock_session().discard_missing_download();
                Err(self.fail("Download failed", e))
            }
        }
    }

    /// Hand the last downloaded artifact to the platform installer.
    ///
    /// Returns once the installer or handler process has been started.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Precondition`] without a prior successful download
    /// - [`UpdateError::UnsupportedPlatform`] on platforms without a handler
    /// - [`UpdateError::Launch`] if the process cannot be started
    ///
    /// Every error is also broadcast as [`UpdateEvent::Error`].
    pub async fn apply_update(&self) -> Result<ApplyResult> {
        let path = self
            .lock_session()
            .require_download()
            .map(Path::to_owned)
            .map_err(|e| self.fail("Failed to apply update", e))?;

        self.inner.config.logger.info(&format!(
            "Applying update for platform: {}",
            self.inner.platform
        ));

        let result = applier::apply_update(
            &path,
            &self.inner.platform,
            self.inner.launcher.as_ref(),
            self.inner.host.as_ref(),
        )
        .map_err(|e| self.fail("Failed to apply update", e))?;

        self.inner
            .config
            .logger
            .info("Update applied (installer launched).");
        Ok(result)
    }

    async fn try_download(&self) -> Result<PathBuf> {
        let info = self.lock_session().require_update()?.clone();

        let asset = select_asset(&info, &self.inner.platform)
            .cloned()
            .ok_or_else(|| {
                UpdateError::Precondition(format!(
                    "no suitable asset found for platform {} in release {}",
                    self.inner.platform, info.version
                ))
            })?;

        let file_name = Path::new(&asset.name).file_name().ok_or_else(|| {
            UpdateError::Precondition(format!("asset name {:?} is not a file name", asset.name))
        })?;
        let dest = self.inner.config.effective_download_dir().join(file_name);

        self.inner
            .config
            .logger
            .info(&format!("Downloading update asset: {}", asset.url));
        self.debug(&format!("writing {} to {}", asset.name, dest.display()));

        let events = self.inner.events.clone();
        let on_progress: ProgressFn<'_> = &move |progress: DownloadProgress| {
            let _ = events.send(UpdateEvent::DownloadProgress(progress));
        };
        let path = self
            .inner
            .downloader
            .download(&asset.url, &dest, Some(on_progress), asset.sha256.as_deref())
            .await?;

        if let Some(signature_url) = &asset.signature_url {
            self.verify_signature(&path, signature_url).await?;
        }
        Ok(path)
    }

    /// Fetch `<path>.sig` and check it. Both files are removed on failure.
    async fn verify_signature(&self, path: &Path, signature_url: &str) -> Result<()> {
        let sig_path = signature_path(path);
        self.debug(&format!("fetching signature {signature_url}"));

        let outcome = match self
            .inner
            .downloader
            .download(signature_url, &sig_path, None, None)
            .await
        {
            Ok(_) => {
                self.inner
                    .verifier
                    .verify(path, &sig_path, self.inner.config.gpg_keyring.as_deref())
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.inner
                    .config
                    .logger
                    .info(&format!("Signature validated for {}", path.display()));
                Ok(())
            }
            Err(e) => {
                remove_quietly(path).await;
                remove_quietly(&sig_path).await;
                Err(e)
            }
        }
    }

    fn spawn_auto_download(&self) {
        let this = self.clone();
        self.debug("starting automatic download");
        let handle = tokio::spawn(async move { this.download_update().await });
        let previous = self
            .inner
            .auto_download
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if previous.is_some() {
            self.inner
                .config
                .logger
                .warn("an earlier automatic download handle was never collected");
        }
    }

    /// Log, broadcast and hand back `err`.
    fn fail(&self, context: &str, err: UpdateError) -> UpdateError {
        self.inner.config.logger.error(&format!("{context}: {err}"));
        self.emit(UpdateEvent::Error(err.clone()));
        err
    }

    fn emit(&self, event: UpdateEvent) {
        self.debug(&format!("event: {}", event.name()));
        // Sending only fails when nobody is subscribed.
        let _ = self.inner.events.send(event);
    }

    fn debug(&self, message: &str) {
        if self.inner.config.debug {
            self.inner.config.logger.debug(message);
            self.inner.host.forward_debug(message);
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionState> {
        self.inner.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `<path>.sig`, keeping the original extension.
fn signature_path(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".sig");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::UpdateLogger;
    use crate::update::host::EmbeddedHost;

    #[test]
    fn signature_path_appends_suffix() {
        assert_eq!(
            signature_path(Path::new("/tmp/App-2.0.0.AppImage")),
            PathBuf::from("/tmp/App-2.0.0.AppImage.sig")
        );
    }

    #[test]
    fn invalid_repo_fails_construction() {
        for repo in ["invalid-repo-format", "a/b/c", "/repo", ""] {
            let err = Updater::new(UpdaterConfig::new(repo)).unwrap_err();
            assert_eq!(err.code(), "CONFIG_INVALID", "{repo}");
        }
    }

    #[test]
    fn platform_override_is_used() {
        let updater =
            Updater::new(UpdaterConfig::new("test/repo").with_platform(Platform::Linux)).unwrap();
        assert_eq!(updater.platform(), &Platform::Linux);
        assert_eq!(updater.config().repo, "test/repo");
    }

    #[tokio::test]
    async fn download_without_check_is_precondition_error_and_event() {
        let updater = Updater::new(UpdaterConfig::new("test/repo")).unwrap();
        let mut rx = updater.subscribe();

        let err = updater.download_update().await.unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");

        match rx.try_recv().unwrap() {
            UpdateEvent::Error(e) => assert_eq!(e, err),
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    impl UpdateLogger for RecordingLogger {
        fn info(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("info: {message}"));
        }
        fn warn(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("warn: {message}"));
        }
        fn error(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("error: {message}"));
        }
    }

    #[tokio::test]
    async fn download_logs_start_before_precondition_failure() {
        let logger = Arc::new(RecordingLogger::default());
        let updater =
            Updater::new(UpdaterConfig::new("test/repo").with_logger(logger.clone())).unwrap();

        updater.download_update().await.unwrap_err();

        let lines = logger.lines.lock().unwrap().clone();
        assert_eq!(lines.first().map(String::as_str), Some("info: Downloading update..."));
        assert!(lines[1].starts_with("error: Download failed: [PRECONDITION_FAILED]"));
    }

    #[tokio::test]
    async fn apply_without_download_is_precondition_error() {
        let updater = Updater::new(UpdaterConfig::new("test/repo")).unwrap();
        let err = updater.apply_update().await.unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");
        assert!(updater.session().last_download.is_none());
    }

    #[tokio::test]
    async fn debug_messages_reach_host_only_when_enabled() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));

        let sink = Arc::clone(&lines);
        let quiet = Updater::builder(UpdaterConfig::new("test/repo"))
            .host(EmbeddedHost::new("1.0.0").with_debug_sink(move |m| {
                sink.lock().unwrap().push(m.to_owned());
            }))
            .build()
            .unwrap();
        let _ = quiet.download_update().await;
        assert!(lines.lock().unwrap().is_empty());

        let sink = Arc::clone(&lines);
        let verbose = Updater::builder(UpdaterConfig::new("test/repo").with_debug(true))
            .host(EmbeddedHost::new("1.0.0").with_debug_sink(move |m| {
                sink.lock().unwrap().push(m.to_owned());
            }))
            .build()
            .unwrap();
        let _ = verbose.download_update().await;
        assert!(lines.lock().unwrap().iter().any(|l| l == "event: error"));
    }
}
