//! Lifecycle events broadcast by the controller.

use std::path::PathBuf;

use crate::error::UpdateError;
use crate::progress::DownloadProgress;
use crate::update::checker::UpdateInfo;

/// Per-subscriber buffer. Slow subscribers skip ahead rather than block.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something that happened during an update session.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// A check has started.
    CheckingForUpdate,
    /// A newer release was found.
    UpdateAvailable(UpdateInfo),
    /// No newer release.
    UpdateNotAvailable,
    /// Bytes received for the current download.
    DownloadProgress(DownloadProgress),
    /// The artifact is on disk and verified.
    Downloaded(PathBuf),
    /// A check, download or apply failed.
    Error(UpdateError),
}

impl UpdateEvent {
    /// Stable kebab-case event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckingForUpdate => "checking-for-update",
            Self::UpdateAvailable(_) => "update-available",
            Self::UpdateNotAvailable => "update-not-available",
            Self::DownloadProgress(_) => "download-progress",
            Self::Downloaded(_) => "downloaded",
            Self::Error(_) => "error",
        }
    }
}
