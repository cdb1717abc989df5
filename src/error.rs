//! Error types for the update pipeline.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`UpdateError::code()`].
//! The same error value is both returned to the caller and delivered to
//! `error` subscribers, so the type is `Clone`.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid updater configuration (e.g. malformed repository identifier).
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Transport failure reaching the release API or asset host.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

    /// Non-success HTTP status or malformed response body.
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";

    /// Release listing had an unexpected top-level shape.
    pub const FORMAT_INVALID: &str = "FORMAT_INVALID";

    /// Too many redirect hops, or a redirect without a usable location.
    pub const REDIRECT_ERROR: &str = "REDIRECT_ERROR";

    /// Downloaded content did not match the expected hash.
    pub const INTEGRITY_MISMATCH: &str = "INTEGRITY_MISMATCH";

    /// Detached signature verification failed.
    pub const SIGNATURE_INVALID: &str = "SIGNATURE_INVALID";

    /// An operation was invoked before the step it depends on succeeded.
    pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";

    /// The running operating system has no install strategy.
    pub const UNSUPPORTED_PLATFORM: &str = "UNSUPPORTED_PLATFORM";

    /// The installer or file handler process could not be started.
    pub const LAUNCH_FAILED: &str = "LAUNCH_FAILED";

    /// Local filesystem failure.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Errors produced by the update pipeline.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    /// Invalid configuration. Raised at construction, before any network access.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Transport failure (connection refused, DNS, read timeout).
    #[error("[{}] {}", error_codes::NETWORK_ERROR, .0)]
    Network(String),

    /// Non-success HTTP status, or a body that is not valid JSON for the schema.
    #[error("[{}] {}", error_codes::PROTOCOL_ERROR, .0)]
    Protocol(String),

    /// The release listing was valid JSON but not an array.
    #[error("[{}] {}", error_codes::FORMAT_INVALID, .0)]
    Format(String),

    /// Redirect chain too long or missing a `Location` header.
    #[error("[{}] {}", error_codes::REDIRECT_ERROR, .0)]
    Redirect(String),

    /// Content hash mismatch.
    #[error("[{}] {}", error_codes::INTEGRITY_MISMATCH, .0)]
    Integrity(String),

    /// Detached signature rejected by the verification tool.
    #[error("[{}] {}", error_codes::SIGNATURE_INVALID, .0)]
    Signature(String),

    /// Download without a prior check, apply without a prior download,
    /// or no asset matching the running platform.
    #[error("[{}] {}", error_codes::PRECONDITION_FAILED, .0)]
    Precondition(String),

    /// Apply invoked on a platform outside Windows, macOS and Linux.
    #[error("[{}] {}", error_codes::UNSUPPORTED_PLATFORM, .0)]
    UnsupportedPlatform(String),

    /// The OS refused to start the installer or file handler.
    #[error("[{}] {}", error_codes::LAUNCH_FAILED, .0)]
    Launch(String),

    /// Local filesystem failure.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(String),
}

impl UpdateError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Network(_) => error_codes::NETWORK_ERROR,
            Self::Protocol(_) => error_codes::PROTOCOL_ERROR,
            Self::Format(_) => error_codes::FORMAT_INVALID,
            Self::Redirect(_) => error_codes::REDIRECT_ERROR,
            Self::Integrity(_) => error_codes::INTEGRITY_MISMATCH,
            Self::Signature(_) => error_codes::SIGNATURE_INVALID,
            Self::Precondition(_) => error_codes::PRECONDITION_FAILED,
            Self::UnsupportedPlatform(_) => error_codes::UNSUPPORTED_PLATFORM,
            Self::Launch(_) => error_codes::LAUNCH_FAILED,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Network(m)
            | Self::Protocol(m)
            | Self::Format(m)
            | Self::Redirect(m)
            | Self::Integrity(m)
            | Self::Signature(m)
            | Self::Precondition(m)
            | Self::UnsupportedPlatform(m)
            | Self::Launch(m)
            | Self::Io(m) => m,
        }
    }

    /// Returns true for both hash mismatches and signature failures.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::Signature(_))
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_prefix() {
        let err = UpdateError::Redirect("too many redirects (6)".into());
        assert_eq!(err.to_string(), "[REDIRECT_ERROR] too many redirects (6)");
    }

    #[test]
    fn message_strips_code() {
        let err = UpdateError::Protocol("HTTP 404".into());
        assert_eq!(err.message(), "HTTP 404");
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            UpdateError::Config(String::new()),
            UpdateError::Network(String::new()),
            UpdateError::Protocol(String::new()),
            UpdateError::Format(String::new()),
            UpdateError::Redirect(String::new()),
            UpdateError::Integrity(String::new()),
            UpdateError::Signature(String::new()),
            UpdateError::Precondition(String::new()),
            UpdateError::UnsupportedPlatform(String::new()),
            UpdateError::Launch(String::new()),
            UpdateError::Io(String::new()),
        ];
        let mut codes: Vec<&str> = all.iter().map(UpdateError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn signature_and_hash_are_both_integrity() {
        assert!(UpdateError::Integrity("x".into()).is_integrity());
        assert!(UpdateError::Signature("x".into()).is_integrity());
        assert!(!UpdateError::Network("x".into()).is_integrity());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: UpdateError = io.into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.message().contains("gone"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UpdateError>();
    }
}
