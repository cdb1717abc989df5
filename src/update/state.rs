//! Update session state.
//!
//! Two single-slot fields threaded between the three controller operations:
//! the last resolved release and the last downloaded artifact. The phase is
//! derived from which slots are filled, and the `require_*` guards turn the
//! ordering rules (download after check, apply after download) into
//! `Precondition` errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdateError};
use crate::update::checker::UpdateInfo;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No update recorded. Downloading is not allowed.
    Idle,
    /// An available update is recorded but nothing has been downloaded yet.
    Checked,
    /// An artifact is on disk and may be applied.
    Downloaded,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checked => write!(f, "checked"),
            Self::Downloaded => write!(f, "downloaded"),
        }
    }
}

/// Session slots owned by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Release found by the most recent successful check, if it was newer.
    pub last_update: Option<UpdateInfo>,
    /// Path written by the most recent successful download.
    pub last_download: Option<PathBuf>,
    /// When the most recent successful check completed.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Current phase. A downloaded artifact wins over a recorded release
    /// because a later check never invalidates the file on disk.
    pub fn phase(&self) -> SessionPhase {
        if self.last_download.is_some() {
            SessionPhase::Downloaded
        } else if self.last_update.is_some() {
            SessionPhase::Checked
        } else {
            SessionPhase::Idle
        }
    }

    /// Record the outcome of a successful check. `None` means "not available".
    ///
    /// Supersedes the previous release. The downloaded path is kept.
    pub fn record_check(&mut self, update: Option<UpdateInfo>) {
        self.last_update = update;
        self.last_checked_at = Some(Utc::now());
    }

    /// Record a completed download, overwriting any earlier path.
    pub fn record_download(&mut self, path: PathBuf) {
        self.last_download = Some(path);
    }

    /// Forget the recorded download if its file no longer exists.
    pub fn discard_missing_download(&mut self) {
        if self.last_download.as_deref().is_some_and(|p| !p.exists()) {
            self.last_download = None;
        }
    }

    /// The release to download.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Precondition`] if no check has recorded an
    /// available update.
    pub fn require_update(&self) -> Result<&UpdateInfo> {
        self.last_update.as_ref().ok_or_else(|| {
            UpdateError::Precondition(
                "no update info available; call check_for_updates() first".to_owned(),
            )
        })
    }

    /// The artifact to apply.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Precondition`] if nothing has been downloaded.
    pub fn require_download(&self) -> Result<&Path> {
        self.last_download.as_deref().ok_or_else(|| {
            UpdateError::Precondition(
                "no downloaded update to apply; call download_update() first".to_owned(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn update(version: &str) -> UpdateInfo {
        UpdateInfo {
            version: version.to_owned(),
            release_name: version.to_owned(),
            release_notes: String::new(),
            published_at: None,
            assets: Vec::new(),
        }
    }

    #[test]
    fn new_session_is_idle() {
        let state = SessionState::default();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.last_checked_at.is_none());
    }

    #[test]
    fn download_requires_check() {
        let err = SessionState::default().require_update().unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");
        assert!(err.message().contains("check_for_updates"));
    }

    #[test]
    fn apply_requires_download() {
        let mut state = SessionState::default();
        state.record_check(Some(update("2.0.0")));
        let err = state.require_download().unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");
    }

    #[test]
    fn check_moves_to_checked() {
        let mut state = SessionState::default();
        state.record_check(Some(update("2.0.0")));
        assert_eq!(state.phase(), SessionPhase::Checked);
        assert_eq!(state.require_update().unwrap().version, "2.0.0");
        assert!(state.last_checked_at.is_some());
    }

    #[test]
    fn unavailable_check_clears_update() {
        let mut state = SessionState::default();
        state.record_check(Some(update("2.0.0")));
        state.record_check(None);
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.require_update().is_err());
    }

    #[test]
    fn new_check_keeps_downloaded_path() {
        let mut state = SessionState::default();
        state.record_check(Some(update("2.0.0")));
        state.record_download(PathBuf::from("/tmp/App-2.0.0.AppImage"));
        state.record_check(Some(update("2.1.0")));

        assert_eq!(state.phase(), SessionPhase::Downloaded);
        assert_eq!(state.require_update().unwrap().version, "2.1.0");
        assert_eq!(
            state.require_download().unwrap(),
            Path::new("/tmp/App-2.0.0.AppImage")
        );
    }

    #[test]
    fn new_download_overwrites_path() {
        let mut state = SessionState::default();
        state.record_download(PathBuf::from("/tmp/a"));
        state.record_download(PathBuf::from("/tmp/b"));
        assert_eq!(state.require_download().unwrap(), Path::new("/tmp/b"));
    }

    #[test]
    fn missing_download_file_is_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.AppImage");
        std::fs::write(&kept, b"x").unwrap();

        let mut state = SessionState::default();
        state.record_download(kept.clone());
        state.discard_missing_download();
        assert_eq!(state.require_download().unwrap(), kept.as_path());

        std::fs::remove_file(&kept).unwrap();
        state.discard_missing_download();
        assert!(state.last_download.is_none());
    }

    #[test]
    fn phase_display() {
        assert_eq!(SessionPhase::Idle.to_string(), "idle");
        assert_eq!(SessionPhase::Checked.to_string(), "checked");
        assert_eq!(SessionPhase::Downloaded.to_string(), "downloaded");
    }
}
