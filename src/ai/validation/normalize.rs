//! Response Normalization
//!
//! Strips formatting artifacts that providers wrap around structured output:
//! - Markdown code fences (```json ... ```)
//! - Language tag on the opening fence line
//! - Byte order marks and surrounding whitespace
//!
//! Never fails. Unbalanced or absent fences fall back to the trimmed input.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

const FENCE: &str = "```";

/// A first fence line made only of tag characters (`json`, `c++`, `text`)
static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+#.\-]*$").expect("language tag pattern is valid")
});

/// Extract the candidate structured blob from raw provider output
pub fn normalize(raw: &str) -> String {
    match extract_fenced(raw) {
        Some(inner) => {
            debug!(chars = inner.len(), "Extracted fenced block");
            trim_wrapping(inner).to_string()
        }
        None => trim_wrapping(raw).to_string(),
    }
}

/// Content between the first opening fence and the fence that closes it
///
/// The opening fence is the whole backtick run (three or more); only a run at
/// least as long closes it, so shorter runs inside the block stay content.
fn extract_fenced(raw: &str) -> Option<&str> {
    let open = raw.find(FENCE)?;
    let width = backtick_run(&raw[open..]);
    let after_open = &raw[open + width..];
    let close = find_closing_run(after_open, width)?;
    let inner = &after_open[..close];

    match inner.split_once('\n') {
        Some((first_line, rest)) if is_language_tag(first_line) => Some(rest),
        _ => Some(inner),
    }
}

fn backtick_run(s: &str) -> usize {
    s.bytes().take_while(|&b| b == b'`').count()
}

/// Byte offset of the first backtick run of at least `width`
fn find_closing_run(s: &str, width: usize) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = s[offset..].find('`') {
        let start = offset + pos;
        let run = backtick_run(&s[start..]);
        if run >= width {
            return Some(start);
        }
        offset = start + run;
    }
    None
}

fn is_language_tag(line: &str) -> bool {
    LANGUAGE_TAG.is_match(line.trim())
}

fn trim_wrapping(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_is_trimmed() {
        assert_eq!(normalize("  [1, 2]\n"), "[1, 2]");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_fenced_json_with_language_tag() {
        let raw = "```json\n[{\"title\":\"Two Sum\",\"slug\":\"two-sum\"}]\n```";
        assert_eq!(normalize(raw), r#"[{"title":"Two Sum","slug":"two-sum"}]"#);
    }

    #[test]
    fn test_fenced_without_language_tag() {
        let raw = "```\n{\"problems\": []}\n```";
        assert_eq!(normalize(raw), r#"{"problems": []}"#);
    }

    #[test]
    fn test_prose_around_fence_is_dropped() {
        let raw = "Here are your problems:\n```json\n[1]\n```\nEnjoy!";
        assert_eq!(normalize(raw), "[1]");
    }

    #[test]
    fn test_first_line_with_structure_is_kept() {
        let raw = "```{\"problems\":\n[1]}\n```";
        assert_eq!(normalize(raw), "{\"problems\":\n[1]}");
    }

    #[test]
    fn test_single_line_fence_is_kept_whole() {
        assert_eq!(normalize("```[1,2]```"), "[1,2]");
    }

    #[test]
    fn test_only_first_fence_pair_is_used() {
        let raw = "```json\n[1]\n```\n```json\n[2]\n```";
        assert_eq!(normalize(raw), "[1]");
    }

    #[test]
    fn test_unbalanced_fence_falls_back_to_raw() {
        let raw = "```json\n[1, 2]";
        assert_eq!(normalize(raw), "```json\n[1, 2]");
    }

    #[test]
    fn test_four_backtick_fence_is_one_delimiter() {
        let raw = "````json\n[1]\n````";
        assert_eq!(normalize(raw), "[1]");
        assert_eq!(crate::ai::validation::parse(&normalize(raw)).unwrap().len(), 1);
    }

    #[test]
    fn test_shorter_run_does_not_close_longer_fence() {
        let raw = "````\n[\"```\"]\n````";
        assert_eq!(normalize(raw), "[\"```\"]");
    }

    #[test]
    fn test_inline_backticks_inside_block_are_content() {
        let raw = "```json\n{\"problems\": [\"use `map`\"]}\n```";
        assert_eq!(normalize(raw), "{\"problems\": [\"use `map`\"]}");
    }

    #[test]
    fn test_bom_is_stripped() {
        assert_eq!(normalize("\u{feff}[1]"), "[1]");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent_without_fences(s in "[^`]*") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
