//! Download progress snapshots.
//!
//! Progress is transient: it is only delivered through callbacks and
//! `download-progress` events while a download is active.

use serde::Serialize;

/// Instantaneous snapshot of an in-flight download.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownloadProgress {
    /// Bytes written to disk so far.
    pub transferred: u64,
    /// Total size announced by the server (`Content-Length`), if any.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Create a snapshot.
    pub fn new(transferred: u64, total: Option<u64>) -> Self {
        Self { transferred, total }
    }

    /// Completion fraction in `0.0..=1.0`.
    ///
    /// Returns `0.0` when the total is unknown or zero.
    pub fn fraction(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => (self.transferred as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }

    /// Completion percentage in `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Whether the server announced a content length.
    pub fn has_total(&self) -> bool {
        self.total.is_some()
    }
}

/// Borrowed progress sink, called once per received chunk.
pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);
