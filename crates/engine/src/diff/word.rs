//! Token-level diff shared by the word diff and the word-level merge.

use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp};
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|\W+").expect("valid token pattern"));

/// Split text into maximal runs of word and non-word characters, so
/// whitespace and punctuation are tokens too. Concatenating the tokens
/// gives back the input.
pub fn tokenize(text: &str) -> Vec<&str> {
    TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

/// LCS diff of two token sequences.
pub(crate) fn token_ops(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    similar::capture_diff_slices(Algorithm::Lcs, old, new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordChangeKind {
    Equal,
    Insert,
    Delete,
}

/// A run of tokens with the same change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordChange {
    pub kind: WordChangeKind,
    pub value: String,
}

/// Word-level diff of two strings. A replaced run shows up as a deletion
/// followed by an insertion.
pub fn word_diff(old: &str, new: &str) -> Vec<WordChange> {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);

    let mut changes: Vec<WordChange> = Vec::new();
    let mut push = |kind: WordChangeKind, tokens: &[&str]| {
        if tokens.is_empty() {
            return;
        }
        let value = tokens.concat();
        match changes.last_mut() {
            Some(last) if last.kind == kind => last.value.push_str(&value),
            _ => changes.push(WordChange { kind, value }),
        }
    };

    for op in token_ops(&old_tokens, &new_tokens) {
        match op {
            DiffOp::Equal { old_index, len, .. } => {
                push(WordChangeKind::Equal, &old_tokens[old_index..old_index + len]);
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                push(WordChangeKind::Delete, &old_tokens[old_index..old_index + old_len]);
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                push(WordChangeKind::Insert, &new_tokens[new_index..new_index + new_len]);
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                push(WordChangeKind::Delete, &old_tokens[old_index..old_index + old_len]);
                push(WordChangeKind::Insert, &new_tokens[new_index..new_index + new_len]);
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: WordChangeKind, value: &str) -> WordChange {
        WordChange {
            kind,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hello, world! It's 2024."),
            vec!["Hello", ", ", "world", "! ", "It", "'", "s", " ", "2024", "."]
        );
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("café au lait").concat(), "café au lait");
    }

    #[test]
    fn test_word_diff_replacement() {
        let changes = word_diff("The quick brown fox", "The fast brown fox");
        assert_eq!(
            changes,
            vec![
                change(WordChangeKind::Equal, "The "),
                change(WordChangeKind::Delete, "quick"),
                change(WordChangeKind::Insert, "fast"),
                change(WordChangeKind::Equal, " brown fox"),
            ]
        );
    }

    #[test]
    fn test_word_diff_insertion_and_deletion() {
        let changes = word_diff("Run the tests", "Run all the tests now");
        let inserted: String = changes
            .iter()
            .filter(|c| c.kind == WordChangeKind::Insert)
            .map(|c| c.value.as_str())
            .collect();
        assert!(inserted.contains("all"));
        assert!(inserted.contains("now"));
        assert!(!changes.iter().any(|c| c.kind == WordChangeKind::Delete));
    }

    #[test]
    fn test_word_diff_identical() {
        let changes = word_diff("Same text.", "Same text.");
        assert_eq!(changes, vec![change(WordChangeKind::Equal, "Same text.")]);
    }
}
