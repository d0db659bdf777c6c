//! Boundary finders for each segmentation granularity.

mod paragraph;
mod section;
mod sentence;

pub use paragraph::ParagraphSplitter;
pub use section::SectionSplitter;
pub use sentence::SentenceSplitter;

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::markdown::is_protected;

/// Trait for unit splitters.
pub trait UnitSplitter {
    /// Byte offsets at which a new piece starts. Offsets inside `protected`
    /// ranges must not be returned; the caller sorts and deduplicates.
    fn boundaries(&self, text: &str, protected: &[Range<usize>]) -> Vec<usize>;
}

static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid blank line pattern"));

/// Cut points after every blank-line run outside protected ranges.
pub(crate) fn blank_line_boundaries(text: &str, protected: &[Range<usize>]) -> Vec<usize> {
    BLANK_LINE_RUN
        .find_iter(text)
        .filter(|m| !is_protected(m.start(), protected) && !is_protected(m.end(), protected))
        .map(|m| m.end())
        .filter(|&end| end < text.len())
        .collect()
}
