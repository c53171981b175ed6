use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::rendering::RenderConfig;
use super::window::WindowConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // plain keys first; TOML can't put them after a table
    pub log_level: String,
    pub window: WindowConfig,
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            fs::write(path, content)
                .with_context(|| format!("Failed to write default config to {}", path.display()))?;
            info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Falls back to `Info` for unknown level names.
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("org", "jade", "jade").context("Couldn't determine project directory")?;
    Ok(proj_dirs.config_dir().join("engine.toml"))
}
