//! Operating-system families the update pipeline knows how to serve.
//!
//! Asset naming heuristics and install strategies are keyed on the OS family
//! only. CPU architecture is deliberately not part of [`Platform`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// The OS family an update is selected and installed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    #[serde(rename = "macos")]
    MacOs,
    /// Linux desktop distributions.
    Linux,
    /// Any other OS, carrying the `std::env::consts::OS` value.
    #[serde(untagged)]
    Unsupported(String),
}

impl Platform {
    /// Detect the platform of the running process.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as in `std::env::consts::OS`) to a platform.
    ///
    /// Node-style identifiers (`win32`, `darwin`) are accepted too.
    pub fn from_os(os: &str) -> Self {
        match os.to_ascii_lowercase().as_str() {
            "windows" | "win32" => Self::Windows,
            "macos" | "darwin" => Self::MacOs,
            "linux" => Self::Linux,
            other => Self::Unsupported(other.to_owned()),
        }
    }

    /// Returns `true` for the three platforms with an install strategy.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Unsupported(os) => write!(f, "{os}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_os_maps_known_families() {
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(Platform::from_os("win32"), Platform::Windows);
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("darwin"), Platform::MacOs);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
    }

    #[test]
    fn unknown_os_is_unsupported() {
        let p = Platform::from_os("freebsd");
        assert_eq!(p, Platform::Unsupported("freebsd".into()));
        assert!(!p.is_supported());
        assert_eq!(p.to_string(), "freebsd");
    }

    #[test]
    fn current_matches_build_target() {
        let p = Platform::current();
        if cfg!(target_os = "linux") {
            assert_eq!(p, Platform::Linux);
        } else if cfg!(target_os = "macos") {
            assert_eq!(p, Platform::MacOs);
        } else if cfg!(target_os = "windows") {
            assert_eq!(p, Platform::Windows);
        }
    }

    #[test]
    fn toml_round_trip_uses_lowercase_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            platform: Platform,
        }
        let parsed: Wrapper = toml::from_str("platform = \"macos\"").unwrap();
        assert_eq!(parsed.platform, Platform::MacOs);
    }
}
