//! Init Command
//!
//! Initialize problembank in the current directory.

use crate::cli::ui::Output;
use crate::cli::util::create_store;
use crate::config::{ConfigLoader, PROJECT_DIR};
use crate::types::{PoolError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = root.join(PROJECT_DIR);

    if project_dir.exists() && !force {
        return Err(PoolError::Config(
            "Already initialized. Use --force to re-run initialization.".to_string(),
        ));
    }

    ConfigLoader::init_project()?;

    // Global config is a convenience; never fail init over it
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load()?;
    create_store(&config)?;

    let output = Output::new();
    output.success(&format!("Initialized problembank in {}/", PROJECT_DIR));
    println!("  Database: {}", config.store.path.display());
    println!();
    println!("Next steps:");
    println!("  1. Export GEMINI_API_KEY and/or GROQ_API_KEY");
    println!("  2. Run 'problembank acquire --topic Arrays --difficulty Medium'");

    Ok(())
}
