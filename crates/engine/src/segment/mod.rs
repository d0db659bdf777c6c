//! Segmentation of raw text into semantic units.
//!
//! Units carry the exact whitespace around their content so that
//! [`reconstruct`] can rebuild the source without loss:
//! - sentence, paragraph or section granularity
//! - fenced code blocks are never split when markdown is preserved
//! - structural tags (heading, list item, code block) attached per unit

pub(crate) mod markdown;
pub mod splitters;

use crate::hash::content_hash;
use markdown::{detect_kind, fenced_code_ranges};
use serde::{Deserialize, Serialize};
use splitters::{ParagraphSplitter, SectionSplitter, SentenceSplitter, UnitSplitter};
use textmerge_core::AppError;

/// Structural tag of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UnitKind {
    #[default]
    Plain,
    Heading {
        level: u8,
    },
    ListItem {
        ordered: bool,
    },
    CodeBlock,
    /// Conflict block spliced into merge output.
    #[serde(rename_all = "camelCase")]
    ConflictMarker {
        conflict_id: String,
    },
}

/// The atomic unit of comparison and merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticUnit {
    /// Trimmed text
    pub content: String,

    /// `create_hash(normalize(content))`; shared by duplicate sentences
    pub hash: String,

    /// Position in the source sequence (0-indexed)
    pub index: usize,

    /// Byte offset of `content` in the source string
    pub start: usize,

    /// Byte offset one past the end of `content`
    pub end: usize,

    /// Whitespace preceding `content` in the source
    pub prefix: String,

    /// Whitespace following `content` in the source
    pub suffix: String,

    /// Structural tag
    #[serde(default)]
    pub kind: UnitKind,
}

impl SemanticUnit {
    /// Create a unit with no surrounding whitespace.
    pub fn new(content: &str, index: usize) -> Self {
        let content = content.trim();
        Self {
            content: content.to_string(),
            hash: content_hash(content),
            index,
            start: 0,
            end: content.len(),
            prefix: String::new(),
            suffix: String::new(),
            kind: detect_kind(content),
        }
    }

    /// A new unit at the same position and spacing with different content.
    pub fn with_content(&self, content: &str) -> Self {
        let content = content.trim();
        Self {
            content: content.to_string(),
            hash: content_hash(content),
            kind: detect_kind(content),
            ..self.clone()
        }
    }

    /// A conflict block standing in for `original`.
    pub fn conflict_marker(original: &SemanticUnit, conflict_id: &str, marker: &str) -> Self {
        let suffix = if original.suffix.contains('\n') {
            original.suffix.clone()
        } else {
            "\n".to_string()
        };
        Self {
            content: marker.to_string(),
            hash: content_hash(marker),
            index: original.index,
            start: original.start,
            end: original.end,
            prefix: "\n".to_string(),
            suffix,
            kind: UnitKind::ConflictMarker {
                conflict_id: conflict_id.to_string(),
            },
        }
    }

    pub fn is_conflict_marker(&self) -> bool {
        matches!(self.kind, UnitKind::ConflictMarker { .. })
    }
}

/// Unit size used when splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Sentence,
    Paragraph,
    Section,
}

impl std::str::FromStr for Granularity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sentence" => Ok(Granularity::Sentence),
            "paragraph" => Ok(Granularity::Paragraph),
            "section" => Ok(Granularity::Section),
            other => Err(AppError::Config(format!(
                "Unknown granularity: {}. Supported: sentence, paragraph, section",
                other
            ))),
        }
    }
}

/// Options for [`segment`].
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    pub granularity: Granularity,

    /// Protect fenced code blocks and split at markdown block starts
    pub preserve_markdown: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Sentence,
            preserve_markdown: true,
        }
    }
}

/// Output of [`segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub units: Vec<SemanticUnit>,
    pub original: String,
}

/// Split `text` into semantic units. Never fails; whitespace-only input
/// yields no units.
pub fn segment(text: &str, options: &SegmentOptions) -> Segmentation {
    if text.trim().is_empty() {
        return Segmentation {
            units: Vec::new(),
            original: text.to_string(),
        };
    }

    let protected = if options.preserve_markdown {
        fenced_code_ranges(text)
    } else {
        Vec::new()
    };

    let splitter = dispatch_splitter(options);
    let mut cuts = splitter.boundaries(text, &protected);
    cuts.retain(|&cut| cut > 0 && cut < text.len());
    cuts.sort_unstable();
    cuts.dedup();

    let units = build_units(text, &cuts);

    tracing::debug!(
        "Segmented {} bytes into {} units ({:?})",
        text.len(),
        units.len(),
        options.granularity
    );

    Segmentation {
        units,
        original: text.to_string(),
    }
}

/// Select the splitter for a granularity.
fn dispatch_splitter(options: &SegmentOptions) -> Box<dyn UnitSplitter> {
    match options.granularity {
        Granularity::Sentence => Box::new(SentenceSplitter {
            markdown: options.preserve_markdown,
        }),
        Granularity::Paragraph => Box::new(ParagraphSplitter),
        Granularity::Section => Box::new(SectionSplitter),
    }
}

/// Turn the pieces between cut points into units. Whitespace-only pieces
/// are folded into the previous unit's suffix, or into the first unit's
/// prefix when nothing precedes them.
fn build_units(text: &str, cuts: &[usize]) -> Vec<SemanticUnit> {
    let mut units: Vec<SemanticUnit> = Vec::new();
    let mut pending_prefix = String::new();
    let mut start = 0;

    for end in cuts.iter().copied().chain(std::iter::once(text.len())) {
        let piece = &text[start..end];
        let content = piece.trim();

        if content.is_empty() {
            match units.last_mut() {
                Some(last) => last.suffix.push_str(piece),
                None => pending_prefix.push_str(piece),
            }
        } else {
            let lead = piece.len() - piece.trim_start().len();
            let content_start = start + lead;

            let mut prefix = std::mem::take(&mut pending_prefix);
            prefix.push_str(&piece[..lead]);

            units.push(SemanticUnit {
                content: content.to_string(),
                hash: content_hash(content),
                index: units.len(),
                start: content_start,
                end: content_start + content.len(),
                prefix,
                suffix: piece[lead + content.len()..].to_string(),
                kind: detect_kind(content),
            });
        }

        start = end;
    }

    units
}

/// Concatenate units back into text, inserting a single space between
/// neighbours whose boundary carries no whitespace.
pub fn reconstruct(units: &[SemanticUnit]) -> String {
    let mut out = String::new();
    let mut previous: Option<&SemanticUnit> = None;

    for unit in units {
        if let Some(prev) = previous {
            let spaced = prev.suffix.chars().any(char::is_whitespace)
                || unit.prefix.chars().any(char::is_whitespace);
            if !spaced {
                out.push(' ');
            }
        }
        out.push_str(&unit.prefix);
        out.push_str(&unit.content);
        out.push_str(&unit.suffix);
        previous = Some(unit);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(text: &str, options: &SegmentOptions) -> Vec<String> {
        segment(text, options)
            .units
            .into_iter()
            .map(|u| u.content)
            .collect()
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(segment("", &SegmentOptions::default()).units.is_empty());
        assert!(segment("  \n\t \n", &SegmentOptions::default()).units.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            "One. Two. Three.",
            "  Leading space. And trailing.  \n\n",
            "# Title\n\nFirst para. Second sentence!\n\n- item one\n- item two\n",
            "Code:\n\n```\nx = 1. Y = 2.\n\n```\n\nDone.",
            "no punctuation at all",
            "Gamedex é um aplicativo 🎮 brasileiro. Acentuação: ã, õ. Emoji 🚀 fim.",
        ];
        for granularity in [Granularity::Sentence, Granularity::Paragraph, Granularity::Section] {
            for text in samples {
                let options = SegmentOptions {
                    granularity,
                    preserve_markdown: true,
                };
                let units = segment(text, &options).units;
                assert_eq!(reconstruct(&units).trim(), text.trim(), "{:?}", text);
                assert_eq!(reconstruct(&units), text, "exact for {:?}", text);
            }
        }
    }

    #[test]
    fn test_trailing_whitespace_lands_in_last_suffix() {
        let units = segment("Alpha. Beta.\n\n   ", &SegmentOptions::default()).units;
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].suffix, "\n\n   ");
        assert_eq!(units[0].suffix, " ");
    }

    #[test]
    fn test_offsets_and_indices() {
        let text = "  First one. Second one.";
        let units = segment(text, &SegmentOptions::default()).units;
        assert_eq!(units[0].prefix, "  ");
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.index, i);
            assert_eq!(&text[unit.start..unit.end], unit.content);
        }
    }

    #[test]
    fn test_hash_is_case_and_punctuation_insensitive() {
        let a = segment("Hello World.", &SegmentOptions::default()).units;
        let b = segment("hello world.", &SegmentOptions::default()).units;
        assert_eq!(a[0].hash, b[0].hash);
    }

    #[test]
    fn test_paragraph_and_section_granularity() {
        let text = "# One\nA. B.\n\nC.\n## Two\nD.";
        let paragraphs = contents(
            text,
            &SegmentOptions {
                granularity: Granularity::Paragraph,
                preserve_markdown: true,
            },
        );
        assert_eq!(paragraphs, vec!["# One\nA. B.", "C.\n## Two\nD."]);

        let sections = contents(
            text,
            &SegmentOptions {
                granularity: Granularity::Section,
                preserve_markdown: true,
            },
        );
        assert_eq!(sections, vec!["# One\nA. B.\n\nC.", "## Two\nD."]);
    }

    #[test]
    fn test_kinds() {
        let text = "## Setup\n- install it\n\n```\nmake. Run.\n```";
        let units = segment(text, &SegmentOptions::default()).units;
        let kinds: Vec<_> = units.iter().map(|u| u.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                UnitKind::Heading { level: 2 },
                UnitKind::ListItem { ordered: false },
                UnitKind::CodeBlock
            ]
        );
    }

    #[test]
    fn test_without_markdown_code_is_split() {
        let text = "```\nx. Y.\n```";
        let options = SegmentOptions {
            granularity: Granularity::Sentence,
            preserve_markdown: false,
        };
        assert_eq!(segment(text, &options).units.len(), 2);
    }

    #[test]
    fn test_reconstruct_inserts_space_between_glued_units() {
        let units = vec![SemanticUnit::new("One.", 0), SemanticUnit::new("Two.", 1)];
        assert_eq!(reconstruct(&units), "One. Two.");
    }

    #[test]
    fn test_with_content_keeps_spacing() {
        let unit = segment("  Old text.\n", &SegmentOptions::default()).units[0].clone();
        let updated = unit.with_content("New text.");
        assert_eq!(updated.prefix, "  ");
        assert_eq!(updated.suffix, "\n");
        assert_ne!(updated.hash, unit.hash);
        assert_eq!(updated.index, unit.index);
    }

    #[test]
    fn test_unit_kind_serialization() {
        let json = serde_json::to_string(&UnitKind::Heading { level: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"heading","level":3}"#);
        let marker: UnitKind =
            serde_json::from_str(r#"{"type":"conflict-marker","conflictId":"conflict-1"}"#).unwrap();
        assert_eq!(
            marker,
            UnitKind::ConflictMarker {
                conflict_id: "conflict-1".to_string()
            }
        );
    }
}
