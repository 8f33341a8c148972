//! Acquire Command
//!
//! Claim one unused problem for a key and print its payload.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{AllocationKey, Result};

pub async fn run(topic: &str, difficulty: &str, format: &str) -> Result<()> {
    let key = AllocationKey::parse(topic, difficulty)?;
    let ctx = CommandContext::load()?;
    let allocator = ctx.allocator()?;

    let acquisition = allocator.acquire_with_deadline(&key).await?;
    let record = acquisition.record;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let output = Output::new();
        output.success(&format!(
            "{} [{}]",
            record.title().unwrap_or("(untitled)"),
            key
        ));
        if acquisition.refilled {
            output.info("Sub-pool was empty and has been refilled");
        }
        println!("{}", serde_json::to_string_pretty(&record.payload)?);
    }

    Ok(())
}
