//! Self-update pipeline for applications published as GitHub releases.
//!
//! Resolves the newest eligible release, selects the asset for the running
//! platform, downloads and verifies it, and hands it to the platform
//! installer. [`Updater`] drives the stages and broadcasts [`UpdateEvent`]s.

pub mod applier;
pub mod asset;
pub mod checker;
pub mod downloader;
pub mod events;
pub mod host;
pub mod signature;
pub mod state;
pub mod updater;

pub use applier::{ApplyResult, Launcher, SystemLauncher};
pub use checker::{AssetInfo, ReleaseChecker, UpdateInfo};
pub use downloader::Downloader;
pub use events::UpdateEvent;
pub use host::{EmbeddedHost, HostEnvironment, StandaloneHost};
pub use signature::{GpgVerifier, SignatureVerifier};
pub use state::{SessionPhase, SessionState};
pub use updater::{Updater, UpdaterBuilder};
