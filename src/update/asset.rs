//! Platform asset selection.
//!
//! Matching is a case-insensitive suffix/substring heuristic on the asset
//! file name. The first asset in release order that matches wins. CPU
//! architecture is not considered.

use crate::platform::Platform;
use crate::update::checker::{AssetInfo, UpdateInfo};

const WINDOWS_SUFFIXES: &[&str] = &[".exe", ".msi", ".nsis.zip"];
const WINDOWS_MARKERS: &[&str] = &["win", "windows", "setup"];

const MACOS_SUFFIXES: &[&str] = &[".dmg", ".zip", ".pkg"];
const MACOS_MARKERS: &[&str] = &["mac", "darwin", "osx"];

const LINUX_SUFFIXES: &[&str] = &[".appimage", ".tar.gz", ".deb", ".rpm", ".snap"];
const LINUX_MARKERS: &[&str] = &["linux"];

/// Whether `file_name` looks like an installable artifact for `platform`.
pub fn matches_platform(file_name: &str, platform: &Platform) -> bool {
    let (suffixes, markers) = match platform {
        Platform::Windows => (WINDOWS_SUFFIXES, WINDOWS_MARKERS),
        Platform::MacOs => (MACOS_SUFFIXES, MACOS_MARKERS),
        Platform::Linux => (LINUX_SUFFIXES, LINUX_MARKERS),
        Platform::Unsupported(_) => return false,
    };
    let name = file_name.to_ascii_lowercase();
    suffixes.iter().any(|s| name.ends_with(s)) || markers.iter().any(|m| name.contains(m))
}

/// Select the first asset of `info` matching `platform`.
pub fn select_asset<'a>(info: &'a UpdateInfo, platform: &Platform) -> Option<&'a AssetInfo> {
    info.assets
        .iter()
        .find(|a| matches_platform(&a.name, platform))
}
