//! Content hash verification for downloaded artifacts.
//!
//! Hashes are computed by re-reading the finished file from disk rather than
//! incrementally while streaming, so the digest always reflects what will
//! actually be executed.
//!
//! # Example
//!
//! ```rust
//! use forge_updater::integrity::digest_matches;
//!
//! assert!(digest_matches("ABCDEF", "abcdef"));
//! ```

use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, UpdateError};

/// Compute the SHA-256 hex digest of a file's contents.
///
/// Reads the file in 64 KiB chunks to avoid loading large installers into
/// memory all at once.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(format!("{digest:x}"))
}

/// Case-insensitive comparison of two hex digests, ignoring surrounding whitespace.
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

/// Verify a file against an expected SHA-256 hex digest.
///
/// The hash runs on the blocking pool so large files do not stall the
/// async runtime.
///
/// # Errors
///
/// Returns [`UpdateError::Integrity`] on mismatch and [`UpdateError::Io`]
/// if the file cannot be read.
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let owned: PathBuf = path.to_owned();
    let actual = tokio::task::spawn_blocking(move || sha256_hex(&owned))
        .await
        .map_err(|e| UpdateError::Io(format!("hash task failed: {e}")))??;

    if digest_matches(&actual, expected) {
        debug!(path = %path.display(), "sha256 ok");
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected,
            actual = %actual,
            "sha256 mismatch"
        );
        Err(UpdateError::Integrity(format!(
            "sha256 mismatch for {}: expected {expected}, got {actual}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // sha256("hello world")
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_temp(content: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("create temp file");
        f.write_all(content).expect("write content");
        f
    }

    #[test]
    fn sha256_hex_known_value() {
        let f = write_temp(b"hello world");
        assert_eq!(sha256_hex(f.path()).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn sha256_hex_missing_file_errors() {
        assert!(sha256_hex(Path::new("/nonexistent/forge-updater/file.bin")).is_err());
    }

    #[test]
    fn digest_comparison_ignores_case() {
        assert!(digest_matches(HELLO_SHA256, &HELLO_SHA256.to_uppercase()));
        assert!(!digest_matches(HELLO_SHA256, "deadbeef"));
    }

    #[tokio::test]
    async fn verify_accepts_uppercase_expected() {
        let f = write_temp(b"hello world");
        let result = verify_sha256(f.path(), &HELLO_SHA256.to_uppercase()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_mismatch() {
        let f = write_temp(b"tampered");
        let err = verify_sha256(f.path(), HELLO_SHA256).await.unwrap_err();
        assert_eq!(err.code(), "INTEGRITY_MISMATCH");
        assert!(err.message().contains(HELLO_SHA256));
    }

    #[tokio::test]
    async fn verify_missing_file_is_io_error() {
        let err = verify_sha256(Path::new("/nonexistent/forge-updater/x"), HELLO_SHA256)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
