//! Harness settings.
//!
//! Every field has a default matching the conventional project layout
//! (`pretrained_models/`, `asset/`, `output/`), so a settings file only needs
//! the values it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{default_catalog, ModelCatalogEntry, DEFAULT_MODEL, MODELSCOPE_ENDPOINT};
use crate::engines::worker::{WorkerCommand, WorkerModelParams};
use crate::naming::NamingStrategy;

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "tts-harness.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model_root: PathBuf,
    pub model_name: String,
    pub output_dir: PathBuf,
    pub reference: ReferenceSettings,
    /// Instruction used when instruct mode is requested without one.
    pub default_instruction: String,
    pub worker: WorkerCommand,
    pub load: WorkerModelParams,
    pub naming: NamingStrategy,
    /// Interpreter modules the worker needs.
    pub required_packages: Vec<String>,
    pub catalog: Vec<ModelCatalogEntry>,
    pub hub: HubSettings,
}

/// The bundled reference prompt and what is said in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    pub path: PathBuf,
    pub transcript: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub endpoint: String,
    pub attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from("pretrained_models"),
            model_name: DEFAULT_MODEL.to_string(),
            output_dir: PathBuf::from("output"),
            reference: ReferenceSettings::default(),
            default_instruction: "用標準普通話說這句話".to_string(),
            worker: WorkerCommand::default(),
            load: WorkerModelParams::default(),
            naming: NamingStrategy::default(),
            required_packages: ["torch", "torchaudio", "transformers"]
                .into_iter()
                .map(String::from)
                .collect(),
            catalog: default_catalog(),
            hub: HubSettings::default(),
        }
    }
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("asset/zero_shot_prompt.wav"),
            transcript: "希望你以后能够做的比我还好呦。".to_string(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: MODELSCOPE_ENDPOINT.to_string(),
            attempts: 3,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else `tts-harness.json` when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    log::info!("Using settings from {DEFAULT_CONFIG_FILE}");
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Directory of the default model.
    pub fn model_dir(&self) -> PathBuf {
        self.model_root.join(&self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_follow_project_layout() {
        let settings = Settings::default();
        assert_eq!(
            settings.model_dir(),
            PathBuf::from("pretrained_models/CosyVoice2-0.5B")
        );
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert_eq!(settings.naming, NamingStrategy::Counter);
        assert_eq!(settings.catalog.len(), 4);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"output_dir": "renders", "naming": "directory_count", "hub": {"attempts": 5}}"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("renders"));
        assert_eq!(settings.naming, NamingStrategy::DirectoryCount);
        assert_eq!(settings.hub.attempts, 5);
        assert_eq!(settings.hub.endpoint, "https://modelscope.cn");
        assert_eq!(settings.model_name, DEFAULT_MODEL);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
