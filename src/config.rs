// ⚙️ Configuration - JSON settings file with serde defaults
//
// A missing file is not an error: every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "omnicard.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cleaned catalog CSV
    pub catalog_path: PathBuf,

    /// JSON rule table replacing the built-in intent rules
    pub intent_rules_path: Option<PathBuf>,

    /// Characters of rewards text shown per card
    pub summary_length: usize,

    pub server_addr: String,

    /// Log file used while the terminal UI owns the screen
    pub log_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            catalog_path: PathBuf::from("cleaned_credit_cards.csv"),
            intent_rules_path: None,
            summary_length: 100,
            server_addr: "0.0.0.0:3000".to_string(),
            log_path: PathBuf::from("omnicard.log"),
        }
    }
}

impl AppConfig {
    /// Read the config file if it exists; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
