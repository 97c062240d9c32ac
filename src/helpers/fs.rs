//! File System Utilities
//!
//! Config/data directory resolution and file-name safe key encoding.

use crate::error::{Error, Result};
use directories::ProjectDirs;
use home::home_dir;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_FALLBACK: &str = ".lifegrid";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "lifegrid", "lifegrid")
}

/// `~/.lifegrid/<sub>` for platforms without a standard project layout
fn home_fallback(sub: &str) -> Result<PathBuf> {
    let Some(home) = home_dir() else {
        return Err(Error::storage(
            "Could not determine project directories or home directory",
        ));
    };
    Ok(home.join(APP_DIR_FALLBACK).join(sub))
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

/// Get or create the application's configuration directory
///
/// Platform-specific locations:
/// - **Linux**: `~/.config/lifegrid/` or `$XDG_CONFIG_HOME/lifegrid/`
/// - **macOS**: `~/Library/Application Support/dev.lifegrid.lifegrid/`
/// - **Windows**: `C:\Users\<User>\AppData\Roaming\lifegrid\lifegrid\config\`
///
/// Falls back to `~/.lifegrid/config/`.
pub fn get_or_create_config_dir() -> Result<PathBuf> {
    match project_dirs() {
        Some(dirs) => ensure_dir(dirs.config_dir()),
        None => ensure_dir(&home_fallback("config")?),
    }
}

/// Get or create the data directory (persisted scroll records)
///
/// Platform-specific locations:
/// - **Linux**: `~/.local/share/lifegrid/`
/// - **macOS**: `~/Library/Application Support/dev.lifegrid.lifegrid/`
/// - **Windows**: `C:\Users\<User>\AppData\Roaming\lifegrid\lifegrid\data\`
///
/// Falls back to `~/.lifegrid/data/`.
pub fn get_or_create_data_dir() -> Result<PathBuf> {
    match project_dirs() {
        Some(dirs) => ensure_dir(dirs.data_dir()),
        None => ensure_dir(&home_fallback("data")?),
    }
}

/// Encode an arbitrary key as a single file name.
///
/// ASCII alphanumerics plus `-`, `_` and `.` pass through; every other byte
/// becomes `%XX`, so distinct keys always map to distinct names.
pub fn encode_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            // A leading dot would hide the file; escape it there only
            b'.' if !out.is_empty() => out.push('.'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
