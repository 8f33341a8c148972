//! AI Response Validation
//!
//! Turns raw provider output into problem payloads:
//! - `normalize`: strips code fences and wrapper characters
//! - `payload`: strict decode of the bare-array or wrapped-array shapes
//!
//! ## Design Philosophy
//! - Normalization is lenient and never fails
//! - Decoding is strict: a usable sequence or a `ParseFailure`, nothing in between

mod normalize;
mod payload;

pub use normalize::normalize;
pub use payload::{PayloadShape, parse};

use serde_json::Value;
use tracing::debug;

use crate::types::ParseFailure;

/// Normalize then decode raw provider output
pub fn extract_problems(raw: &str) -> Result<Vec<Value>, ParseFailure> {
    let normalized = normalize(raw);
    debug!(
        raw_chars = raw.len(),
        normalized_chars = normalized.len(),
        "Decoding provider output"
    );
    parse(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_response() {
        let raw = "```json\n[{\"title\":\"Two Sum\",\"slug\":\"two-sum\"}]\n```";
        let problems = extract_problems(raw).unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0]["title"], "Two Sum");
    }

    #[test]
    fn test_extract_failure_keeps_normalized_text() {
        let err = extract_problems("```json\n{\"oops\": true}\n```").unwrap_err();
        assert_eq!(err.text, "{\"oops\": true}");
    }
}
