use super::{blank_line_boundaries, UnitSplitter};
use std::ops::Range;

/// Splits on blank lines.
pub struct ParagraphSplitter;

impl UnitSplitter for ParagraphSplitter {
    fn boundaries(&self, text: &str, protected: &[Range<usize>]) -> Vec<usize> {
        blank_line_boundaries(text, protected)
    }
}
