//! On-disk project helpers: atomic writes, JSON files and `dfc init`.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;
use crate::settings::{save_settings, CompilerSettings};

/// Starter program written by `dfc init`.
const STARTER_SOURCE: &str = r#"// Sends a greeting to everyone when called.
func main() {
    @all codeblock "SendMessage" <"PLAYER ACTION">(`Hello from dfc!`);
}
"#;

/// Atomically write bytes to a file using write-to-temp-then-rename.
///
/// 1. Writes data to a `.tmp` sibling file
/// 2. Calls `fsync` to flush to disk
/// 3. Renames the existing file to `.bak` (best-effort)
/// 4. Renames the `.tmp` file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let file_name = path.file_name().unwrap_or_default();

    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut bak_name = OsString::from(file_name);
    bak_name.push(".bak");
    let bak_path = path.with_file_name(&bak_name);

    let mut file = fs::File::create(&tmp_path).map_err(|e| AppError::io(&tmp_path, e))?;
    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|e| AppError::io(&tmp_path, e))?;
    drop(file);

    if path.exists() {
        let _ = fs::rename(path, &bak_path);
    }

    fs::rename(&tmp_path, path).map_err(|e| AppError::io(path, e))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AppError::Json {
        path: String::new(),
        message: e.to_string(),
    })?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let data = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let de = &mut serde_json::Deserializer::from_str(&data);
    serde_path_to_error::deserialize(de).map_err(|e| AppError::json(&e, Some(path)))
}

/// Create `dir` with a default `dfc.json` and a starter `main.dfc`.
///
/// Existing files are left alone. Returns the paths that were written.
pub fn init_project(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;
    let mut written = Vec::new();

    let config = crate::paths::config_path(dir);
    if !config.exists() {
        save_settings(dir, &CompilerSettings::default())?;
        written.push(config);
    }

    let source = crate::paths::default_source_path(dir);
    if !source.exists() {
        atomic_write(&source, STARTER_SOURCE.as_bytes())?;
        written.push(source);
    }

    info!("initialized project in {} ({} new files)", dir.display(), written.len());
    Ok(written)
}
