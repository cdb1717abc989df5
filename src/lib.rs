//! forge-updater: self-update support for desktop applications released on
//! GitHub.
//!
//! # Architecture
//!
//! The pipeline runs as three separately invoked operations on an
//! [`Updater`]:
//! - **Check**: queries the releases API, filters drafts, prereleases and
//!   channels, and compares the newest tag with the running version
//! - **Download**: picks the asset matching the platform, streams it to disk
//!   following redirects, then verifies its SHA-256 and detached signature
//! - **Apply**: starts the installer or hands the file to the system handler
//!
//! Progress and outcomes are broadcast as [`UpdateEvent`]s.
//!
//! ```no_run
//! use forge_updater::{Updater, UpdaterConfig};
//!
//! # async fn run() -> forge_updater::Result<()> {
//! let updater = Updater::new(UpdaterConfig::new("owner/app").with_auto_download(false))?;
//! if updater.check_for_updates().await.is_some() {
//!     updater.download_update().await?;
//!     updater.apply_update().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod integrity;
pub mod platform;
pub mod progress;
pub mod update;

pub use config::{TracingLogger, UpdateLogger, UpdaterConfig};
pub use error::{Result, UpdateError};
pub use platform::Platform;
pub use progress::{DownloadProgress, ProgressFn};
pub use update::{UpdateEvent, UpdateInfo, Updater, UpdaterBuilder};
