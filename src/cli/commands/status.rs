//! Status Command
//!
//! Display per-key pool counts.

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_initialized};
use crate::types::Result;

pub fn run(format: &str) -> Result<()> {
    let json_output = format == "json";

    if !is_initialized() {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("problembank status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'problembank init' first.");
        }
        // Informational; not an error
        return Ok(());
    }

    let ctx = CommandContext::load()?;
    let stats = ctx.store.stats()?;
    let eligible: Vec<String> = ctx
        .config
        .resolved_providers()
        .iter()
        .filter(|p| p.api_key.is_some())
        .map(|p| p.kind.to_string())
        .collect();

    if json_output {
        let status = serde_json::json!({
            "status": "initialized",
            "database": ctx.config.store.path,
            "providers_with_keys": eligible,
            "pools": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let output = Output::new();
    println!("problembank status");
    println!("══════════════════════════════════════");
    println!("Database: {}", ctx.config.store.path.display());
    if eligible.is_empty() {
        output.warning("No provider API keys configured; empty pools cannot refill");
    } else {
        println!("Providers: {}", eligible.join(" → "));
    }

    output.section("Pools");
    if stats.is_empty() {
        println!("  (empty)");
    } else {
        output.pool_table(&stats);
    }

    Ok(())
}
