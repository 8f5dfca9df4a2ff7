//! Centralized file names and path-building functions.
//!
//! No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const CONFIG_FILE: &str = "dfc.json";
pub const DEFAULT_SOURCE_FILE: &str = "main.dfc";
pub const DEFAULT_ACTIONDUMP_FILE: &str = "actiondump.json";

// ── Project-dir functions ────────────────────────────────────────

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE)
}

pub fn default_source_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DEFAULT_SOURCE_FILE)
}

// ── Source-relative functions ────────────────────────────────────

/// Directory holding `source`; `.` for a bare file name.
pub fn source_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve a configured path against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
