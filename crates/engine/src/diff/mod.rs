//! Edit scripts between two versions of a document.
//!
//! Aligned unit pairs become KEEP/INSERT/DELETE/REPLACE edits anchored to
//! unit hashes of the original. At word granularity each REPLACE is split
//! into token-span edits inside its unit.

pub mod word;

pub use word::{tokenize, word_diff, WordChange, WordChangeKind};

use crate::align::{align, AlignOptions, AlignedPair};
use crate::embeddings::EmbeddingProvider;
use crate::segment::{segment, SegmentOptions, SemanticUnit};
use serde::{Deserialize, Serialize};
use similar::DiffOp;
use textmerge_core::AppResult;
use word::token_ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EditOp {
    Keep,
    Insert,
    Delete,
    Replace,
    /// Reserved; never produced by [`diff`].
    Move,
}

/// What an edit's content refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditScope {
    /// The whole anchored unit
    #[default]
    Unit,
    /// A token span inside the anchored unit
    Word,
}

/// Text around the edited content, used when the anchor hash is gone.
///
/// For unit edits these are the neighbouring units' contents; for word edits
/// the text before and after the token span inside the unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl AnchorContext {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// One atomic change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub operation: EditOp,

    /// Hash of the targeted unit in the base; empty for unanchored inserts
    pub anchor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_context: Option<AnchorContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,

    pub confidence: f32,

    #[serde(default)]
    pub scope: EditScope,
}

impl Edit {
    fn unit(operation: EditOp, anchor: &str) -> Self {
        Self {
            operation,
            anchor: anchor.to_string(),
            anchor_context: None,
            old_content: None,
            new_content: None,
            confidence: 1.0,
            scope: EditScope::Unit,
        }
    }

    pub fn keep(unit: &SemanticUnit) -> Self {
        Self {
            old_content: Some(unit.content.clone()),
            ..Self::unit(EditOp::Keep, &unit.hash)
        }
    }

    pub fn delete(unit: &SemanticUnit, context: AnchorContext) -> Self {
        Self {
            anchor_context: Some(context).filter(|c| !c.is_empty()),
            old_content: Some(unit.content.clone()),
            ..Self::unit(EditOp::Delete, &unit.hash)
        }
    }

    pub fn replace(
        unit: &SemanticUnit,
        new_content: &str,
        confidence: f32,
        context: AnchorContext,
    ) -> Self {
        Self {
            anchor_context: Some(context).filter(|c| !c.is_empty()),
            old_content: Some(unit.content.clone()),
            new_content: Some(new_content.to_string()),
            confidence: confidence.clamp(0.0, 1.0),
            ..Self::unit(EditOp::Replace, &unit.hash)
        }
    }

    /// Insert `new_content` after the unit with hash `anchor` ("" for the
    /// start of the document).
    pub fn insert(anchor: &str, new_content: &str, context: AnchorContext) -> Self {
        Self {
            anchor_context: Some(context).filter(|c| !c.is_empty()),
            new_content: Some(new_content.to_string()),
            ..Self::unit(EditOp::Insert, anchor)
        }
    }

    /// Required fields for the operation are present.
    pub fn is_well_formed(&self) -> bool {
        match self.operation {
            EditOp::Keep | EditOp::Move => true,
            EditOp::Insert => self.new_content.is_some(),
            EditOp::Delete => !self.anchor.is_empty() && self.old_content.is_some(),
            EditOp::Replace => self.old_content.is_some() && self.new_content.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffGranularity {
    /// One edit per changed unit
    #[default]
    Unit,
    /// Changed units are split into token-span edits
    Word,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    pub segment: SegmentOptions,
    pub align: AlignOptions,
    pub granularity: DiffGranularity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub kept: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub replaced: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub edits: Vec<Edit>,
    pub stats: DiffStats,
}

/// Edit script turning `original` into `modified`.
pub async fn diff(
    original: &str,
    modified: &str,
    options: &DiffOptions,
    provider: Option<&dyn EmbeddingProvider>,
) -> AppResult<DiffResult> {
    let source = segment(original, &options.segment).units;
    let target = segment(modified, &options.segment).units;

    let alignment = align(&source, &target, &options.align, provider).await?;
    let mut edits = pairs_to_edits(&alignment.pairs, &source);

    if options.granularity == DiffGranularity::Word {
        edits = edits.into_iter().flat_map(expand_word_edits).collect();
    }

    let stats = count_edits(&edits);
    tracing::debug!(
        "Diff: {} kept, {} inserted, {} deleted, {} replaced",
        stats.kept,
        stats.inserted,
        stats.deleted,
        stats.replaced
    );

    Ok(DiffResult { edits, stats })
}

fn count_edits(edits: &[Edit]) -> DiffStats {
    let mut stats = DiffStats::default();
    for edit in edits {
        match edit.operation {
            EditOp::Keep => stats.kept += 1,
            EditOp::Insert => stats.inserted += 1,
            EditOp::Delete => stats.deleted += 1,
            EditOp::Replace => stats.replaced += 1,
            EditOp::Move => {}
        }
    }
    stats
}

/// Contents of the units before and after position `index` of `source`.
fn neighbour_context(source: &[SemanticUnit], index: usize) -> AnchorContext {
    AnchorContext {
        before: index
            .checked_sub(1)
            .and_then(|i| source.get(i))
            .map(|u| u.content.clone()),
        after: source.get(index + 1).map(|u| u.content.clone()),
    }
}

/// Convert aligned pairs into unit-scope edits.
pub fn pairs_to_edits(pairs: &[AlignedPair], source: &[SemanticUnit]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(pairs.len());
    let mut preceding: Option<&SemanticUnit> = None;

    for pair in pairs {
        match (&pair.source, &pair.target) {
            (Some(old), Some(new)) => {
                if old.content == new.content {
                    edits.push(Edit::keep(old));
                } else {
                    edits.push(Edit::replace(
                        old,
                        &new.content,
                        pair.similarity,
                        neighbour_context(source, old.index),
                    ));
                }
                preceding = Some(old);
            }
            (Some(old), None) => {
                edits.push(Edit::delete(old, neighbour_context(source, old.index)));
                preceding = Some(old);
            }
            (None, Some(new)) => {
                let next_index = preceding.map_or(0, |u| u.index + 1);
                let context = AnchorContext {
                    before: preceding.map(|u| u.content.clone()),
                    after: source.get(next_index).map(|u| u.content.clone()),
                };
                let anchor = preceding.map_or("", |u| u.hash.as_str());
                edits.push(Edit::insert(anchor, &new.content, context));
            }
            (None, None) => {}
        }
    }

    edits
}

/// Split a unit REPLACE into word-scope edits, one per changed token run.
/// Other edits pass through unchanged.
fn expand_word_edits(edit: Edit) -> Vec<Edit> {
    let (Some(old), Some(new)) = (&edit.old_content, &edit.new_content) else {
        return vec![edit];
    };
    if edit.operation != EditOp::Replace || edit.scope != EditScope::Unit {
        return vec![edit];
    }

    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let span_context = |start: usize, end: usize| AnchorContext {
        before: Some(old_tokens[..start].concat()),
        after: Some(old_tokens[end..].concat()),
    };

    let mut word_edits = Vec::new();
    for op in token_ops(&old_tokens, &new_tokens) {
        let (operation, old_range, new_range) = match op {
            DiffOp::Equal { .. } => continue,
            DiffOp::Delete {
                old_index, old_len, ..
            } => (EditOp::Delete, old_index..old_index + old_len, 0..0),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => (EditOp::Insert, old_index..old_index, new_index..new_index + new_len),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => (
                EditOp::Replace,
                old_index..old_index + old_len,
                new_index..new_index + new_len,
            ),
        };

        let old_text = old_tokens[old_range.clone()].concat();
        let new_text = new_tokens[new_range].concat();
        word_edits.push(Edit {
            operation,
            anchor: edit.anchor.clone(),
            anchor_context: Some(span_context(old_range.start, old_range.end)),
            old_content: (operation != EditOp::Insert).then_some(old_text),
            new_content: (operation != EditOp::Delete).then_some(new_text),
            confidence: edit.confidence,
            scope: EditScope::Word,
        });
    }

    word_edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignStrategy;
    use crate::embeddings::providers::trigram::TrigramProvider;

    fn sequential() -> DiffOptions {
        DiffOptions {
            align: AlignOptions {
                strategy: AlignStrategy::Sequential,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn ops(result: &DiffResult) -> Vec<EditOp> {
        result.edits.iter().map(|e| e.operation).collect()
    }

    #[tokio::test]
    async fn test_identical_texts_keep_everything() {
        let provider = TrigramProvider::new(128);
        let text = "First sentence here. Second sentence here.";
        let result = diff(text, text, &DiffOptions::default(), Some(&provider))
            .await
            .unwrap();
        assert_eq!(ops(&result), vec![EditOp::Keep, EditOp::Keep]);
        assert_eq!(result.stats.kept, 2);
    }

    #[tokio::test]
    async fn test_insert_and_delete_edits() {
        let provider = TrigramProvider::new(128);
        let original = "Alpha goes first. Beta follows. Gamma ends it.";
        let modified = "Alpha goes first. Gamma ends it. Delta joins late.";

        let result = diff(original, modified, &sequential(), Some(&provider))
            .await
            .unwrap();
        assert_eq!(
            ops(&result),
            vec![EditOp::Keep, EditOp::Delete, EditOp::Keep, EditOp::Insert]
        );

        let delete = &result.edits[1];
        assert_eq!(delete.old_content.as_deref(), Some("Beta follows."));
        let context = delete.anchor_context.as_ref().unwrap();
        assert_eq!(context.before.as_deref(), Some("Alpha goes first."));
        assert_eq!(context.after.as_deref(), Some("Gamma ends it."));

        let insert = &result.edits[3];
        assert_eq!(insert.anchor, crate::hash::content_hash("Gamma ends it."));
        assert_eq!(insert.new_content.as_deref(), Some("Delta joins late."));
        assert!(result.edits.iter().all(Edit::is_well_formed));
    }

    #[tokio::test]
    async fn test_insert_at_start_is_unanchored() {
        let provider = TrigramProvider::new(128);
        let result = diff("", "Brand new text.", &DiffOptions::default(), Some(&provider))
            .await
            .unwrap();
        assert_eq!(ops(&result), vec![EditOp::Insert]);
        assert_eq!(result.edits[0].anchor, "");
    }

    #[tokio::test]
    async fn test_word_granularity_splits_replace() {
        let provider = TrigramProvider::new(256);
        let options = DiffOptions {
            granularity: DiffGranularity::Word,
            ..sequential()
        };
        let original = "Install the package with cargo before running tests.";
        let modified = "Install the package using cargo before running all tests.";

        let result = diff(original, modified, &options, Some(&provider))
            .await
            .unwrap();

        assert!(result.edits.iter().all(|e| e.scope == EditScope::Word));
        assert_eq!(ops(&result), vec![EditOp::Replace, EditOp::Insert]);

        let replace = &result.edits[0];
        assert_eq!(replace.old_content.as_deref(), Some("with"));
        assert_eq!(replace.new_content.as_deref(), Some("using"));
        let context = replace.anchor_context.as_ref().unwrap();
        assert_eq!(context.before.as_deref(), Some("Install the package "));
        assert_eq!(replace.anchor, crate::hash::content_hash(original));
    }

    #[test]
    fn test_edit_serialization_shape() {
        let unit = SemanticUnit::new("Old words.", 0);
        let edit = Edit::replace(&unit, "New words.", 0.8, AnchorContext::default());
        let json = serde_json::to_value(&edit).unwrap();

        assert_eq!(json["operation"], "REPLACE");
        assert_eq!(json["oldContent"], "Old words.");
        assert_eq!(json["newContent"], "New words.");
        assert_eq!(json["scope"], "unit");
        assert!(json.get("anchorContext").is_none());
    }

    #[test]
    fn test_move_and_missing_scope_deserialize() {
        let edit: Edit = serde_json::from_str(
            r#"{"operation":"MOVE","anchor":"abcd1234","confidence":0.5}"#,
        )
        .unwrap();
        assert_eq!(edit.operation, EditOp::Move);
        assert_eq!(edit.scope, EditScope::Unit);
        assert!(edit.is_well_formed());
    }

    #[test]
    fn test_well_formed_rules() {
        let mut edit = Edit::insert("", "x", AnchorContext::default());
        assert!(edit.is_well_formed());
        edit.new_content = None;
        assert!(!edit.is_well_formed());

        let delete = Edit {
            anchor: String::new(),
            ..Edit::delete(&SemanticUnit::new("Gone.", 0), AnchorContext::default())
        };
        assert!(!delete.is_well_formed());
    }
}
