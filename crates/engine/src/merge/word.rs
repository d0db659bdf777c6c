//! Word-level three-way merge of one sentence.
//!
//! Both sides are diffed against the same base tokens. Deletions from either
//! side are honored; insertions at the same point conflict only when both
//! sides inserted different text.

use crate::diff::word::{token_ops, tokenize};
use serde::{Deserialize, Serialize};
use similar::DiffOp;

/// Both sides inserted different text at the same point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRange {
    /// Index of the base token the insertions precede (token count for the end)
    pub position: usize,
    pub b: String,
    pub c: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordMergeResult {
    pub merged: String,
    pub has_conflict: bool,
    pub conflict_ranges: Vec<ConflictRange>,
}

impl WordMergeResult {
    fn clean(merged: &str) -> Self {
        Self {
            merged: merged.to_string(),
            has_conflict: false,
            conflict_ranges: Vec::new(),
        }
    }
}

/// Inline marker for a word-level conflict.
pub fn inline_marker(b: &str, c: &str) -> String {
    format!("<<<{}|{}>>>", b, c)
}

/// What one side did to the base tokens.
struct SideEdits {
    deleted: Vec<bool>,
    /// `inserted[k]` goes right before base token `k`; the last slot is the end
    inserted: Vec<String>,
}

impl SideEdits {
    fn compute(base: &[&str], side: &[&str]) -> Self {
        let mut edits = Self {
            deleted: vec![false; base.len()],
            inserted: vec![String::new(); base.len() + 1],
        };

        for op in token_ops(base, side) {
            match op {
                DiffOp::Equal { .. } => {}
                DiffOp::Delete {
                    old_index, old_len, ..
                } => edits.mark_deleted(old_index, old_len),
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => edits.inserted[old_index].push_str(&side[new_index..new_index + new_len].concat()),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    edits.mark_deleted(old_index, old_len);
                    edits.inserted[old_index].push_str(&side[new_index..new_index + new_len].concat());
                }
            }
        }

        edits
    }

    fn mark_deleted(&mut self, start: usize, len: usize) {
        for flag in &mut self.deleted[start..start + len] {
            *flag = true;
        }
    }
}

/// Merge the changes `b` and `c` made to `a` at token granularity.
pub fn word_merge_3way(a: &str, b: &str, c: &str) -> WordMergeResult {
    if b == c || a == c {
        return WordMergeResult::clean(b);
    }
    if a == b {
        return WordMergeResult::clean(c);
    }

    let base = tokenize(a);
    let b_tokens = tokenize(b);
    let c_tokens = tokenize(c);
    let b_edits = SideEdits::compute(&base, &b_tokens);
    let c_edits = SideEdits::compute(&base, &c_tokens);

    let mut merged = String::with_capacity(a.len().max(b.len()).max(c.len()));
    let mut conflict_ranges = Vec::new();

    for position in 0..=base.len() {
        let from_b = &b_edits.inserted[position];
        let from_c = &c_edits.inserted[position];
        match (from_b.is_empty(), from_c.is_empty()) {
            (true, true) => {}
            (false, true) => merged.push_str(from_b),
            (true, false) => merged.push_str(from_c),
            (false, false) if from_b == from_c => merged.push_str(from_b),
            (false, false) => {
                merged.push_str(&inline_marker(from_b, from_c));
                conflict_ranges.push(ConflictRange {
                    position,
                    b: from_b.clone(),
                    c: from_c.clone(),
                });
            }
        }

        if let Some(token) = base.get(position) {
            if !b_edits.deleted[position] && !c_edits.deleted[position] {
                merged.push_str(token);
            }
        }
    }

    WordMergeResult {
        merged,
        has_conflict: !conflict_ranges.is_empty(),
        conflict_ranges,
    }
}
