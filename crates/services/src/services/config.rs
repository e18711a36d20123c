use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

use crate::services::caption::{DEFAULT_CAPTION_MODEL, DEFAULT_CAPTION_PROMPT};

fn default_diffusion_url() -> String {
    "http://localhost:7860".to_string()
}

fn default_caption_url() -> String {
    "http://localhost:11435".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct DiffusionConfig {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            api_url: default_diffusion_url(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct CaptionConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub model: String,
    pub default_prompt: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            api_url: default_caption_url(),
            timeout_secs: 120,
            model: DEFAULT_CAPTION_MODEL.to_string(),
            default_prompt: DEFAULT_CAPTION_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[serde(default)]
pub struct GenerationConfig {
    /// When true, a freshly generated base image becomes the account's main
    /// image if the account does not have one yet.
    pub auto_set_main_image: bool,
}

/// Credentials for the user created on first startup, when the users table
/// is empty. The generated API token is logged, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct BootstrapUserConfig {
    pub username: String,
    pub email: String,
}

impl Default for BootstrapUserConfig {
    fn default() -> Self {
        Self {
            username: "local".to_string(),
            email: "local@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[serde(default)]
pub struct Config {
    pub diffusion: DiffusionConfig,
    pub caption: CaptionConfig,
    pub generation: GenerationConfig,
    pub bootstrap_user: BootstrapUserConfig,
}

impl Config {
    /// Parses raw config JSON, falling back to defaults when it is invalid.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Invalid config file, using defaults: {}", err);
                Self::default()
            }
        }
    }

    /// Environment variables win over the config file so deployments can
    /// point at different upstreams without editing it.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DIFFUSION_API_URL") {
            self.diffusion.api_url = url;
        }
        if let Ok(url) = std::env::var("LLAVA_API_URL") {
            self.caption.api_url = url;
        }
        self
    }
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &PathBuf) -> Config {
    match std::fs::read_to_string(config_path) {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!("No config file found, creating one");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(config: &Config, config_path: &PathBuf) -> Result<(), ConfigError> {
    let raw_config = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, raw_config)?;
    Ok(())
}
