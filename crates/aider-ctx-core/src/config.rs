use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_EXECUTABLE: &str = "aider";
pub const PROJECT_CONFIG_FILE: &str = ".aider-ctx.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub executable_path: String,
    pub auto_add_on_open: bool,
    pub auto_drop_on_close: bool,
    pub clear_history_on_stop: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            executable_path: DEFAULT_EXECUTABLE.to_string(),
            auto_add_on_open: false,
            auto_drop_on_close: false,
            clear_history_on_stop: false,
        }
    }
}

/// One source of settings; unset fields leave the lower layer in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub executable_path: Option<String>,
    pub auto_add_on_open: Option<bool>,
    pub auto_drop_on_close: Option<bool>,
    pub clear_history_on_stop: Option<bool>,
}

impl ConfigLayer {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Missing file is an empty layer, not an error.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    pub fn from_env() -> Self {
        Self {
            executable_path: env::var("AIDER_CTX_EXECUTABLE")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            auto_add_on_open: env_bool("AIDER_CTX_AUTO_ADD"),
            auto_drop_on_close: env_bool("AIDER_CTX_AUTO_DROP"),
            clear_history_on_stop: env_bool("AIDER_CTX_CLEAR_ON_STOP"),
        }
    }
}

impl SessionConfig {
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(executable_path) = layer.executable_path {
            self.executable_path = executable_path;
        }
        if let Some(value) = layer.auto_add_on_open {
            self.auto_add_on_open = value;
        }
        if let Some(value) = layer.auto_drop_on_close {
            self.auto_drop_on_close = value;
        }
        if let Some(value) = layer.clear_history_on_stop {
            self.clear_history_on_stop = value;
        }
    }

    /// Defaults, then user file, then `<root>/.aider-ctx.toml`, then env.
    /// A malformed file is reported and skipped.
    pub fn resolve(project_root: Option<&Path>) -> (Self, Vec<ConfigError>) {
        let mut config = Self::default();
        let mut errors = Vec::new();

        let mut files = Vec::new();
        if let Some(path) = user_config_path() {
            files.push(path);
        }
        if let Some(root) = project_root {
            files.push(root.join(PROJECT_CONFIG_FILE));
        }

        for path in files {
            match ConfigLayer::read(&path) {
                Ok(layer) => {
                    debug!(path = %path.display(), "config_layer_loaded");
                    config.apply(layer);
                }
                Err(err) => {
                    warn!("config_layer_skipped: {err}");
                    errors.push(err);
                }
            }
        }

        config.apply(ConfigLayer::from_env());
        (config, errors)
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AIDER_CTX_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join("aider-ctx").join("config.toml"))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| parse_bool(&value))
}
