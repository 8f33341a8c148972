//! Config Command
//!
//! Usage:
//!   problembank config show [-f toml|json|yaml]
//!   problembank config path
//!   problembank config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::{PoolError, Result};

/// Show merged effective configuration
pub fn show(format: &str) -> Result<()> {
    let format: ConfigFormat = format.parse().map_err(PoolError::Config)?;
    ConfigLoader::show_config(format)
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_global(force)?;
    Output::new().success("Initialized global configuration");
    println!("  Directory: {}", dir.display());
    Ok(())
}

/// Initialize project configuration
pub fn init_project() -> Result<()> {
    let dir = ConfigLoader::init_project()?;
    Output::new().success("Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
