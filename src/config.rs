//! Configuration module for modforge.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{ForgeError, Result};

/// Path configuration: the roots of the overlay and the mod/library trees.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Input roots searched in priority order; first match wins.
    #[serde(default = "default_input_roots")]
    pub input_roots: Vec<PathBuf>,
    /// Output root where this run's results are materialized.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Directory holding one subdirectory per mod.
    #[serde(default = "default_mods_dir")]
    pub mods: PathBuf,
    /// Directory of named shared library scripts.
    #[serde(default = "default_libraries_dir")]
    pub libraries: PathBuf,
    /// Host settings file (enabled/ordered mod list).
    #[serde(default = "default_settings_file")]
    pub settings: PathBuf,
    /// Overlay-relative path of the id ledger.
    #[serde(default = "default_id_ledger")]
    pub id_ledger: String,
}

fn default_input_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("data")]
}

fn default_output_root() -> PathBuf {
    PathBuf::from("out")
}

fn default_mods_dir() -> PathBuf {
    PathBuf::from("mods")
}

fn default_libraries_dir() -> PathBuf {
    PathBuf::from("libraries")
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("settings.json")
}

fn default_id_ledger() -> String {
    "globals/next_id.txt".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_roots: default_input_roots(),
            output_root: default_output_root(),
            mods: default_mods_dir(),
            libraries: default_libraries_dir(),
            settings: default_settings_file(),
            id_ledger: default_id_ledger(),
        }
    }
}

/// Execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Wrap a single-segment script so the host facade arrives as the chunk
    /// argument and a bare top-level return is tolerated.
    #[serde(default = "default_wrap_top_level_return")]
    pub wrap_top_level_return: bool,
    /// Write a mod's completed config back to its config.json when it changed.
    #[serde(default = "default_persist_config")]
    pub persist_config: bool,
    /// First id handed out when no ledger file exists in any root.
    #[serde(default = "default_id_seed")]
    pub id_seed: u64,
}

fn default_wrap_top_level_return() -> bool {
    true
}

fn default_persist_config() -> bool {
    true
}

fn default_id_seed() -> u64 {
    1
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            wrap_top_level_return: default_wrap_top_level_return(),
            persist_config: default_persist_config(),
            id_seed: default_id_seed(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level configuration loaded from modforge.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.as_ref().display())))?;
        toml::from_str(&text).map_err(|e| ForgeError::Config(e.to_string()))
    }
}
