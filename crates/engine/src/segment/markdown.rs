//! Markdown structure detection used by the splitters.

use super::UnitKind;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub(crate) const FENCE: &str = "```";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fence pattern"));

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s").expect("valid heading pattern"));

static UNORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s").expect("valid list pattern"));

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").expect("valid ordered list pattern"));

/// Byte ranges of closed fenced code blocks. Unclosed fences are left as text.
pub fn fenced_code_ranges(text: &str) -> Vec<Range<usize>> {
    FENCED_BLOCK.find_iter(text).map(|m| m.range()).collect()
}

/// True when `pos` falls strictly inside one of `ranges`.
pub fn is_protected(pos: usize, ranges: &[Range<usize>]) -> bool {
    ranges.iter().any(|r| r.start < pos && pos < r.end)
}

/// Structural tag for a unit's trimmed content.
pub fn detect_kind(content: &str) -> UnitKind {
    if content.starts_with(FENCE) {
        return UnitKind::CodeBlock;
    }
    if let Some(caps) = HEADING.captures(content) {
        return UnitKind::Heading {
            level: caps[1].len() as u8,
        };
    }
    if UNORDERED_ITEM.is_match(content) {
        return UnitKind::ListItem { ordered: false };
    }
    if ORDERED_ITEM.is_match(content) {
        return UnitKind::ListItem { ordered: true };
    }
    UnitKind::Plain
}

/// A line that opens a new markdown block: heading, list item or fence.
pub fn is_block_start(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(FENCE)
        || HEADING.is_match(line)
        || UNORDERED_ITEM.is_match(line)
        || ORDERED_ITEM.is_match(line)
}

pub fn is_heading_line(line: &str) -> bool {
    HEADING.is_match(line.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_code_ranges() {
        let text = "Intro.\n```\nlet x = 1. Y = 2.\n```\nOutro.";
        let ranges = fenced_code_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert!(text[ranges[0].clone()].starts_with("```"));
        assert!(text[ranges[0].clone()].ends_with("```"));
    }

    #[test]
    fn test_unclosed_fence_is_not_protected() {
        assert!(fenced_code_ranges("```\nno end. Here.").is_empty());
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind("## Install"), UnitKind::Heading { level: 2 });
        assert_eq!(detect_kind("- item"), UnitKind::ListItem { ordered: false });
        assert_eq!(detect_kind("3. step"), UnitKind::ListItem { ordered: true });
        assert_eq!(detect_kind("```rust\nfn main() {}\n```"), UnitKind::CodeBlock);
        assert_eq!(detect_kind("#hashtag"), UnitKind::Plain);
        assert_eq!(detect_kind("Plain text."), UnitKind::Plain);
    }
}
