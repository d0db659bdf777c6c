use super::UnitSplitter;
use crate::segment::markdown::{is_heading_line, is_protected};
use std::ops::Range;

/// Starts a new section at every markdown heading line.
pub struct SectionSplitter;

impl UnitSplitter for SectionSplitter {
    fn boundaries(&self, text: &str, protected: &[Range<usize>]) -> Vec<usize> {
        let line_starts = std::iter::once(0).chain(text.match_indices('\n').map(|(i, _)| i + 1));

        line_starts
            .filter(|&start| start > 0 && start < text.len())
            .filter(|&start| !is_protected(start, protected))
            .filter(|&start| {
                let line = text[start..].lines().next().unwrap_or("");
                is_heading_line(line)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::markdown::fenced_code_ranges;

    #[test]
    fn test_section_boundaries() {
        let text = "Preamble.\n# One\nBody one.\n\nMore.\n## Two\nBody two.";
        let cuts = SectionSplitter.boundaries(text, &[]);
        assert_eq!(cuts.len(), 2);
        assert!(text[cuts[0]..].starts_with("# One"));
        assert!(text[cuts[1]..].starts_with("## Two"));
    }

    #[test]
    fn test_hash_comment_in_code_is_not_heading() {
        let text = "# Title\n```sh\n# not a heading\n```\n";
        let protected = fenced_code_ranges(text);
        assert!(SectionSplitter.boundaries(text, &protected).is_empty());
    }
}
