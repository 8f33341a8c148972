//! Run Command
//!
//! Batch run: serve a list of work units, acquiring once per key.
//!
//! Units come from `--units <file>` (JSON array of `{id, topic, difficulty}`),
//! or one unit per `--key topic:difficulty`, or `[batch].keys` from config.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::allocator::{BatchReport, BatchRunner, UnitOutcome, WorkUnit};
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{AllocationKey, PoolError, Result};

/// Options for the run command
#[derive(Debug, Default)]
pub struct RunOptions {
    pub keys: Vec<AllocationKey>,
    pub units_file: Option<PathBuf>,
    pub format: String,
}

#[derive(Debug, Deserialize)]
struct UnitSpec {
    id: String,
    topic: String,
    difficulty: String,
}

/// Read work units from a JSON file
pub fn load_units(path: &Path) -> Result<Vec<WorkUnit>> {
    let content = std::fs::read_to_string(path)?;
    let specs: Vec<UnitSpec> = serde_json::from_str(&content)?;
    specs
        .into_iter()
        .map(|spec| Ok(WorkUnit::new(spec.id, AllocationKey::parse(&spec.topic, &spec.difficulty)?)))
        .collect()
}

fn units_from_keys(keys: &[AllocationKey]) -> Vec<WorkUnit> {
    keys.iter()
        .map(|key| WorkUnit::new(key.to_string(), key.clone()))
        .collect()
}

pub async fn run(options: RunOptions) -> Result<()> {
    let ctx = CommandContext::load()?;

    let units = if let Some(path) = &options.units_file {
        load_units(path)?
    } else if !options.keys.is_empty() {
        units_from_keys(&options.keys)
    } else {
        units_from_keys(&ctx.config.batch.parsed_keys()?)
    };

    if units.is_empty() {
        return Err(PoolError::Config(
            "Nothing to run: pass --key, --units, or set [batch].keys".to_string(),
        ));
    }

    let allocator = ctx.allocator()?;
    let report = BatchRunner::new(&allocator).run(&units).await?;

    if options.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    let output = Output::new();
    output.section("Batch run");

    for result in &report.results {
        match &result.outcome {
            UnitOutcome::Served { title, .. } => output.success(&format!(
                "{} ← {} [{}]",
                result.unit_id,
                title.as_deref().unwrap_or("(untitled)"),
                result.key
            )),
            UnitOutcome::Skipped { reason } => {
                output.warning(&format!("{} skipped: {}", result.unit_id, reason))
            }
        }
    }

    println!();
    println!(
        "Served {} / skipped {} across {} key(s), {} refill(s) in {}ms",
        report.served, report.skipped, report.distinct_keys, report.refills, report.duration_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;
    use tempfile::TempDir;

    #[test]
    fn test_load_units_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "alice@example.com", "topic": "Arrays", "difficulty": "Medium"},
                {"id": "bob@example.com", "topic": "Graphs", "difficulty": "hard"}
            ]"#,
        )
        .unwrap();

        let units = load_units(&path).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].key.difficulty(), Difficulty::Hard);
        assert_eq!(units[0].id, "alice@example.com");
    }

    #[test]
    fn test_load_units_rejects_bad_difficulty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.json");
        std::fs::write(
            &path,
            r#"[{"id": "x", "topic": "Arrays", "difficulty": "Brutal"}]"#,
        )
        .unwrap();

        assert!(matches!(load_units(&path), Err(PoolError::InvalidKey(_))));
    }

    #[test]
    fn test_units_from_keys_use_key_as_id() {
        let key = AllocationKey::new("Trees", Difficulty::Easy).unwrap();
        let units = units_from_keys(&[key]);
        assert_eq!(units[0].id, "Trees/Easy");
    }
}
