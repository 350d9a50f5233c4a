//! Data directory and configuration resolution
//!
//! Resolution order: `MFGAINS_DATA_DIR` env var, then `data_dir` from
//! the user config file, then the platform data directory.

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

const APP_DIR: &str = "mfgains";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    /// Directory scanned for `transactions_*.json` files
    pub fn transactions_dir(&self) -> PathBuf {
        self.data_dir.join("transactions")
    }

    pub fn overrides_file(&self) -> PathBuf {
        self.data_dir.join("fund_type_overrides.json")
    }

    /// Market-cap reference database (ticker -> cap percentages)
    pub fn fund_reference_file(&self) -> PathBuf {
        self.data_dir.join("fund_reference.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("fifo_cache")
    }
}

/// Resolve configuration from environment, config file, and defaults.
pub fn load_config() -> Result<Config> {
    if let Some(dir) = std::env::var_os("MFGAINS_DATA_DIR") {
        return Ok(Config {
            data_dir: PathBuf::from(dir),
        });
    }

    if let Some(config_home) = dir_spec::config_home() {
        let path = config_home.join(APP_DIR).join("config.toml");
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let file: ConfigFile = toml::from_str(&contents)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            if let Some(data_dir) = file.data_dir {
                return Ok(Config { data_dir });
            }
        }
    }

    let data_home = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::data_home)
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(Config {
        data_dir: data_home.join(APP_DIR),
    })
}
