use console::style;

use crate::types::PoolStats;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Per-key pool counts as an aligned table
    pub fn pool_table(&self, stats: &[PoolStats]) {
        let width = stats
            .iter()
            .map(|s| s.topic.chars().count())
            .max()
            .unwrap_or(0)
            .max("Topic".len());

        println!(
            "  {:<width$}  {:<10} {:>7} {:>9}",
            style("Topic").bold(),
            style("Difficulty").bold(),
            style("Unused").bold(),
            style("Consumed").bold(),
            width = width
        );
        for s in stats {
            let unused = if s.unused == 0 {
                style(s.unused.to_string()).red()
            } else {
                style(s.unused.to_string()).green()
            };
            println!(
                "  {:<width$}  {:<10} {:>7} {:>9}",
                s.topic,
                s.difficulty,
                unused,
                s.consumed,
                width = width
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
