use super::{blank_line_boundaries, UnitSplitter};
use crate::segment::markdown::{is_block_start, is_heading_line, is_protected, FENCE};
use std::ops::Range;

/// Abbreviations (without their final period) that never end a sentence
/// when they stand alone.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "etc", "e.g", "i.e", "inc",
    "ltd", "co", "corp", "no", "vol", "fig", "approx", "dept", "est", "cf", "al", "jan", "feb",
    "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

const CLOSING: &[char] = &['"', '\'', ')', ']', '}', '\u{201D}', '\u{2019}'];
const OPENING: &[char] = &['"', '\'', '(', '[', '{', '\u{201C}', '\u{2018}'];

/// Splits at sentence-ending punctuation followed by whitespace and an
/// uppercase letter, and at blank lines.
pub struct SentenceSplitter {
    /// Also split at markdown block starts (headings, list items, fences).
    pub markdown: bool,
}

impl UnitSplitter for SentenceSplitter {
    fn boundaries(&self, text: &str, protected: &[Range<usize>]) -> Vec<usize> {
        let mut cuts = blank_line_boundaries(text, protected);
        cuts.extend(self.punctuation_boundaries(text, protected));
        if self.markdown {
            cuts.extend(line_structure_boundaries(text, protected));
        }
        cuts
    }
}

impl SentenceSplitter {
    fn punctuation_boundaries(&self, text: &str, protected: &[Range<usize>]) -> Vec<usize> {
        let mut cuts = Vec::new();
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if !matches!(c, '.' | '!' | '?') || is_protected(i, protected) {
                continue;
            }

            // Absorb runs like "?!" or "..." and closing quotes/brackets.
            let mut end = i + c.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?') || CLOSING.contains(&next) {
                    end = j + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }

            if c == '.' && (is_standalone_abbreviation(text, i) || is_list_marker(text, i)) {
                continue;
            }

            if let Some(next_start) = sentence_start_after(text, end) {
                if !is_protected(next_start, protected) {
                    cuts.push(next_start);
                }
            }
        }

        cuts
    }
}

/// Offset of the next sentence when `end` is followed by whitespace and an
/// uppercase letter (optionally behind an opening quote or bracket).
fn sentence_start_after(text: &str, end: usize) -> Option<usize> {
    let rest = &text[end..];
    let trimmed = rest.trim_start();
    let ws_len = rest.len() - trimmed.len();
    if ws_len == 0 || trimmed.is_empty() {
        return None;
    }

    let mut next = trimmed.chars();
    let first = next.next()?;
    let starts_sentence = if OPENING.contains(&first) {
        next.next().is_some_and(|c| c.is_uppercase())
    } else {
        first.is_uppercase()
    };

    starts_sentence.then_some(end + ws_len)
}

/// True when the word ending at the period at `dot` is a known abbreviation
/// that is not glued to a preceding token.
fn is_standalone_abbreviation(text: &str, dot: usize) -> bool {
    let before = &text[..dot];
    let token_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic() || *c == '.')
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(dot);

    if token_start == dot {
        return false;
    }

    let token = before[token_start..].to_lowercase();
    if !ABBREVIATIONS.contains(&token.as_str()) {
        return false;
    }

    match before[..token_start].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || OPENING.contains(&c),
    }
}

/// True for the period of an ordered-list marker such as `12.` at line start.
fn is_list_marker(text: &str, dot: usize) -> bool {
    let line_start = text[..dot].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let marker = text[line_start..dot].trim_start_matches(|c| c == ' ' || c == '\t');
    !marker.is_empty() && marker.chars().all(|c| c.is_ascii_digit())
}

/// Cuts at line breaks around markdown blocks: before a heading, list item or
/// fence line, and after a heading or closing fence line.
fn line_structure_boundaries(text: &str, protected: &[Range<usize>]) -> Vec<usize> {
    let mut cuts = Vec::new();
    let mut line_start = 0;

    for (newline, _) in text.match_indices('\n') {
        let next_start = newline + 1;
        let prev_line = text[line_start..newline].trim();
        line_start = next_start;

        if next_start >= text.len() || is_protected(newline, protected) {
            continue;
        }

        let next_line = text[next_start..].lines().next().unwrap_or("");
        let closes_block = is_heading_line(prev_line) || prev_line.ends_with(FENCE);
        if next_line.trim().is_empty() {
            continue;
        }
        if closes_block || is_block_start(next_line) {
            cuts.push(next_start);
        }
    }

    cuts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::markdown::fenced_code_ranges;

    fn pieces(text: &str) -> Vec<String> {
        let protected = fenced_code_ranges(text);
        let mut cuts = SentenceSplitter { markdown: true }.boundaries(text, &protected);
        cuts.sort_unstable();
        cuts.dedup();
        let mut out = Vec::new();
        let mut start = 0;
        for cut in cuts.into_iter().chain(std::iter::once(text.len())) {
            out.push(text[start..cut].trim().to_string());
            start = cut;
        }
        out
    }

    #[test]
    fn test_basic_sentences() {
        assert_eq!(
            pieces("One is here. Two is there! Three?"),
            vec!["One is here.", "Two is there!", "Three?"]
        );
    }

    #[test]
    fn test_lowercase_continuation_does_not_split() {
        assert_eq!(pieces("Version 2. then more"), vec!["Version 2. then more"]);
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(
            pieces("Ask Dr. Smith today. He knows."),
            vec!["Ask Dr. Smith today.", "He knows."]
        );
        assert_eq!(
            pieces("Bring tools, e.g. Hammers and nails."),
            vec!["Bring tools, e.g. Hammers and nails."]
        );
    }

    #[test]
    fn test_abbreviation_inside_token_still_splits() {
        // "xetc." is not the abbreviation "etc."
        assert_eq!(pieces("See xetc. Next one."), vec!["See xetc.", "Next one."]);
    }

    #[test]
    fn test_quotes_and_closing_brackets() {
        assert_eq!(
            pieces("He said \"Stop.\" Then he left. (It was late.) Done."),
            vec!["He said \"Stop.\"", "Then he left.", "(It was late.)", "Done."]
        );
    }

    #[test]
    fn test_code_block_is_never_split() {
        let text = "Run this.\n\n```\nlet a = 1. Let b = 2.\n```\n\nAfter.";
        assert_eq!(
            pieces(text),
            vec!["Run this.", "```\nlet a = 1. Let b = 2.\n```", "After."]
        );
    }

    #[test]
    fn test_markdown_lines() {
        let text = "# Title\nIntro text here.\n- first item\n- second item\n1. Ordered One\n2. Ordered Two";
        assert_eq!(
            pieces(text),
            vec![
                "# Title",
                "Intro text here.",
                "- first item",
                "- second item",
                "1. Ordered One",
                "2. Ordered Two"
            ]
        );
    }
}
