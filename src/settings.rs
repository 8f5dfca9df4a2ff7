use std::path::{Path, PathBuf};

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::project::{read_json, write_json};

const SETTINGS_VERSION: u32 = 1;

/// Compiler settings stored in `dfc.json` beside the source.
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CompilerSettings {
    pub version: u32,
    /// Action catalog, relative to the config file's directory.
    pub actiondump: PathBuf,
    /// Author recorded in every template.
    pub author: String,
    /// Display name of each template item.
    pub template_name: String,
    /// Display name of the container handed to the player.
    pub program_name: String,
    /// Item id of the container in the give command.
    pub container_item: String,
    /// Item id of each template inside the container.
    pub template_item: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            actiondump: PathBuf::from(crate::paths::DEFAULT_ACTIONDUMP_FILE),
            author: "DFCompiler".to_string(),
            template_name: "&bDFCompiler Template".to_string(),
            program_name: "DFCompiler Program".to_string(),
            container_item: "minecraft:shulker_box".to_string(),
            template_item: "minecraft:ender_chest".to_string(),
        }
    }
}

impl CompilerSettings {
    /// JSON schema of the settings file, pretty-printed.
    pub fn json_schema() -> Result<String, AppError> {
        let schema = schemars::schema_for!(CompilerSettings);
        serde_json::to_string_pretty(&schema).map_err(|e| AppError::Json {
            path: String::new(),
            message: e.to_string(),
        })
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings_from(path: &Path) -> Result<CompilerSettings, AppError> {
    if !path.exists() {
        debug!("no settings at {}, using defaults", path.display());
        return Ok(CompilerSettings::default());
    }
    let settings: CompilerSettings = read_json(path)?;
    if settings.version > SETTINGS_VERSION {
        return Err(AppError::Validation {
            message: format!(
                "{} has version {}, newer than supported version {SETTINGS_VERSION}",
                path.display(),
                settings.version
            ),
        });
    }
    debug!("loaded settings from {}", path.display());
    Ok(settings)
}

/// Load `dfc.json` from a project directory.
pub fn load_settings(project_dir: &Path) -> Result<CompilerSettings, AppError> {
    load_settings_from(&crate::paths::config_path(project_dir))
}

/// Save settings to a project directory.
pub fn save_settings(project_dir: &Path, settings: &CompilerSettings) -> Result<(), AppError> {
    std::fs::create_dir_all(project_dir).map_err(|e| AppError::io(project_dir, e))?;
    write_json(&crate::paths::config_path(project_dir), settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let settings = CompilerSettings {
            author: "someone".into(),
            actiondump: PathBuf::from("data/dump.json"),
            ..CompilerSettings::default()
        };
        save_settings(dir.path(), &settings).unwrap();

        let loaded = load_settings(dir.path()).expect("should load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(dir.path()).unwrap(), CompilerSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            crate::paths::config_path(dir.path()),
            r#"{ "program_name": "Parkour" }"#,
        )
        .unwrap();
        let loaded = load_settings(dir.path()).unwrap();
        assert_eq!(loaded.program_name, "Parkour");
        assert_eq!(loaded.author, "DFCompiler");
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(crate::paths::config_path(dir.path()), r#"{ "version": 99 }"#).unwrap();
        assert!(matches!(
            load_settings(dir.path()),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = CompilerSettings::json_schema().unwrap();
        assert!(schema.contains("template_item"));
        assert!(schema.contains("actiondump"));
    }
}
