use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::services::llm::LlmConfig;

const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_export")]
    pub export_folder: String,

    #[serde(default = "default_credential_file")]
    pub credential_file: PathBuf,

    /// Maximum number of transcript characters sent with an analysis request.
    #[serde(default = "default_source_limit")]
    pub source_limit: usize,

    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_folder: default_export(),
            credential_file: default_credential_file(),
            source_limit: default_source_limit(),
            llm: LlmConfig::default(),
        }
    }
}

fn default_export() -> String {
    "output".to_string()
}
fn default_source_limit() -> usize {
    15_000
}
fn default_credential_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tubealchemy"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("credentials.json")
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.export_folder)
            .with_context(|| format!("Failed to create {}", self.export_folder))?;
        Ok(())
    }
}
