//! Platform-specific installer dispatch.
//!
//! Hands a downloaded artifact to the right installer or system handler:
//! Windows executables run directly (and the host is asked to quit), macOS
//! artifacts go to `open`, Linux AppImages are made executable and run,
//! everything else on Linux goes to `xdg-open`. Processes are spawned
//! detached and never awaited.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Result, UpdateError};
use crate::platform::Platform;
use crate::update::host::HostEnvironment;

/// Argument passed to Windows `setup.exe`-style installers.
pub const WINDOWS_UPDATE_FLAG: &str = "--update";

/// Starts detached processes.
pub trait Launcher: Send + Sync {
    /// Spawn `program` with `args` without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the process cannot be started.
    fn spawn(&self, program: &OsStr, args: &[OsString]) -> io::Result<()>;
}

/// Launcher backed by [`std::process::Command`].
///
/// Each child is reaped on a background thread so handlers such as
/// `xdg-open` do not linger as zombies while the host keeps running.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn spawn(&self, program: &OsStr, args: &[OsString]) -> io::Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        std::thread::Builder::new()
            .name("forge-updater-reaper".into())
            .spawn(move || match child.wait() {
                Ok(status) => tracing::debug!(pid, %status, "launched process exited"),
                Err(e) => tracing::warn!(pid, error = %e, "failed to wait for launched process"),
            })?;
        Ok(())
    }
}

/// What was done with the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// The artifact itself was started as an installer.
    InstallerLaunched {
        /// Path that was executed.
        path: PathBuf,
        /// Whether the host was asked to quit.
        quit_requested: bool,
    },
    /// The artifact was passed to a system handler (`open`, `xdg-open`).
    OpenedWithHandler {
        /// Handler program.
        handler: String,
        /// Path handed to the handler.
        path: PathBuf,
    },
}

/// Dispatch `path` to the installer appropriate for `platform`.
///
/// # Errors
///
/// - [`UpdateError::UnsupportedPlatform`] for platforms without a handler
/// - [`UpdateError::Io`] if an AppImage cannot be made executable
/// - [`UpdateError::Launch`] if the process cannot be started
pub fn apply_update(
    path: &Path,
    platform: &Platform,
    launcher: &dyn Launcher,
    host: &dyn HostEnvironment,
) -> Result<ApplyResult> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match platform {
        Platform::Windows => {
            let args: Vec<OsString> = if file_name.contains("setup.exe") {
                vec![WINDOWS_UPDATE_FLAG.into()]
            } else {
                Vec::new()
            };
            launch(launcher, path.as_os_str(), &args)?;
            tracing::info!(path = %path.display(), "installer started, requesting quit");
            host.quit();
            Ok(ApplyResult::InstallerLaunched {
                path: path.to_owned(),
                quit_requested: true,
            })
        }
        Platform::MacOs => open_with(launcher, "open", path),
        Platform::Linux if file_name.ends_with(".appimage") => {
            set_executable(path)?;
            launch(launcher, path.as_os_str(), &[])?;
            tracing::info!(path = %path.display(), "AppImage started");
            Ok(ApplyResult::InstallerLaunched {
                path: path.to_owned(),
                quit_requested: false,
            })
        }
        Platform::Linux => open_with(launcher, "xdg-open", path),
        Platform::Unsupported(os) => Err(UpdateError::UnsupportedPlatform(format!(
            "no installer handler for platform {os}"
        ))),
    }
}

fn open_with(launcher: &dyn Launcher, handler: &str, path: &Path) -> Result<ApplyResult> {
    launch(launcher, OsStr::new(handler), &[path.as_os_str().to_owned()])?;
    tracing::info!(handler, path = %path.display(), "artifact handed to system handler");
    Ok(ApplyResult::OpenedWithHandler {
        handler: handler.to_owned(),
        path: path.to_owned(),
    })
}

fn launch(launcher: &dyn Launcher, program: &OsStr, args: &[OsString]) -> Result<()> {
    launcher.spawn(program, args).map_err(|e| {
        UpdateError::Launch(format!(
            "cannot start {}: {e}",
            Path::new(program).display()
        ))
    })
}

/// Mark `path` as `rwxr-xr-x`. No-op off Unix.
fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            UpdateError::Io(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path;
    Ok(())
}
