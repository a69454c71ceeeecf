use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_RESULT_CACHE_SIZE;
use crate::error::GraphError;

const CONFIG_FILE: &str = "session.toml";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time before a dragged block's final position is sent.
    pub move_debounce_ms: u64,
    pub result_cache_capacity: usize,
    /// Live mode: fetch every visual block's result as soon as it is announced.
    pub play_mode: bool,
    /// Resync from a full snapshot when push sequence numbers skip.
    pub strict_sequencing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            move_debounce_ms: 100,
            result_cache_capacity: DEFAULT_RESULT_CACHE_SIZE,
            play_mode: false,
            strict_sequencing: true,
        }
    }
}

impl SessionConfig {
    pub fn move_debounce(&self) -> Duration {
        Duration::from_millis(self.move_debounce_ms)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, GraphError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load from the per-user location, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Session config saved to {}", path.display());
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "blockgraph", "blockgraph")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }
}
