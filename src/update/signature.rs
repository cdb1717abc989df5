//! Detached signature verification.
//!
//! Verification is delegated to an external tool rather than done
//! in-process. [`GpgVerifier`] runs `gpg --verify`; tests and embedders can
//! supply their own [`SignatureVerifier`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, UpdateError};

/// Checks a file against a detached signature.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify `file` against `signature`, optionally restricted to `keyring`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Signature`] when the signature does not verify
    /// or the tool cannot be run.
    async fn verify(&self, file: &Path, signature: &Path, keyring: Option<&Path>) -> Result<()>;
}

/// Verifier backed by the `gpg` command-line tool.
#[derive(Debug, Clone)]
pub struct GpgVerifier {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GpgVerifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl GpgVerifier {
    /// Use `gpg` from `PATH` with the given subprocess bound.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("gpg"),
            timeout,
        }
    }

    /// Use a specific gpg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Command-line arguments for a verification run.
    pub fn args(file: &Path, signature: &Path, keyring: Option<&Path>) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = Vec::new();
        if let Some(k) = keyring {
            args.push("--keyring".into());
            args.push(k.as_os_str().to_owned());
        }
        args.push("--verify".into());
        args.push(signature.as_os_str().to_owned());
        args.push(file.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl SignatureVerifier for GpgVerifier {
    async fn verify(&self, file: &Path, signature: &Path, keyring: Option<&Path>) -> Result<()> {
        debug!(
            file = %file.display(),
            signature = %signature.display(),
            "verifying detached signature"
        );

        let child = tokio::process::Command::new(&self.program)
            .args(Self::args(file, signature, keyring))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                UpdateError::Signature(format!(
                    "signature check of {} timed out after {}s",
                    file.display(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                UpdateError::Signature(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                ))
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        warn!(
            file = %file.display(),
            code = ?output.status.code(),
            "signature verification failed"
        );
        Err(UpdateError::Signature(format!(
            "signature validation failed for {}: {stderr}",
            file.display()
        )))
    }
}
