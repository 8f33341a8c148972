//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (platform config dir, e.g. ~/.config/problembank/config.toml)
//! 3. Project config (.problembank/config.toml)
//! 4. Environment variables (PROBLEMBANK_* prefix, `__` between sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use super::{ENV_PREFIX, PROJECT_DIR};
use crate::types::{PoolError, Result};

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(format!(
                "Unknown format: {}. Valid values: toml, json, yaml",
                s
            )),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let global = Self::global_config_path();
        Self::load_layered(global.as_deref(), Some(&Self::project_config_path()))
    }

    /// Load from explicit global/project files; missing files are skipped
    pub fn load_layered(global: Option<&Path>, project: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if let Some(project_path) = project
            && project_path.exists()
        {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(project_path));
        }

        // e.g. PROBLEMBANK_ALLOCATOR__BATCH_SIZE -> allocator.batch_size
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PoolError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PoolError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Platform config directory for problembank
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "problembank").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render a configuration; API keys are never included
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        Ok(match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| PoolError::Config(e.to_string()))?
            }
        })
    }

    /// Show current effective configuration
    pub fn show_config(format: ConfigFormat) -> Result<()> {
        let config = Self::load()?;
        println!("{}", Self::render(&config, format)?);
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            PoolError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_config(&global_dir, force)?;
        Ok(global_dir)
    }

    /// Initialize project directory and configuration under `root`
    pub fn init_project_at(root: &Path) -> Result<PathBuf> {
        let project_dir = root.join(PROJECT_DIR);
        Self::write_config(&project_dir, false)?;
        Ok(project_dir)
    }

    /// Initialize project configuration in the working directory
    pub fn init_project() -> Result<PathBuf> {
        Self::init_project_at(Path::new("."))
    }

    fn write_config(dir: &Path, force: bool) -> Result<()> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_file())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Default config file content (TOML)
    fn default_config_file() -> String {
        r#"# problembank configuration
# Project settings in .problembank/config.toml override the global file.
# Environment overrides use PROBLEMBANK_<SECTION>__<KEY>, e.g.
# PROBLEMBANK_ALLOCATOR__BATCH_SIZE=10

version = "1.0"

[store]
path = ".problembank/pool.db"
busy_timeout_ms = 5000

[allocator]
batch_size = 5
settle_delay_ms = 0
# acquire_timeout_secs = 120

[chain]
max_attempts = 5
initial_delay_ms = 1000
backoff_factor = 2.0
max_delay_secs = 16

# Providers are tried in order. API keys fall back to
# GEMINI_API_KEY / GROQ_API_KEY when not set here.
[[providers]]
kind = "gemini"
model = "gemini-2.5-flash"
timeout_secs = 30

[[providers]]
kind = "groq"
model = "llama-3.3-70b-versatile"
timeout_secs = 30

[batch]
# keys = ["Arrays:Medium", "Graphs:Hard"]
keys = []
"#
        .to_string()
    }
}
