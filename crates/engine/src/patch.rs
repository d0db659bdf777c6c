//! Patches: serializable edit scripts bound to a base text.
//!
//! Applying a patch resolves each edit's anchor against the base units in
//! three steps: exact hash, neighbour context, then fuzzy match on the old
//! content. Edits that resolve nowhere are reported, never fatal.

use crate::diff::{diff, AnchorContext, DiffOptions, Edit, EditOp, EditScope};
use crate::embeddings::EmbeddingProvider;
use crate::hash::create_hash;
use crate::segment::{reconstruct, segment, SegmentOptions, SemanticUnit, UnitKind};
use crate::similarity::levenshtein_similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textmerge_core::{AppError, AppResult};

pub const PATCH_VERSION: &str = "1.0.0";

/// Confidence of an edit placed through its anchor context.
const CONTEXT_CONFIDENCE: f32 = 0.8;

/// Minimum similarity for the fuzzy old-content fallback.
const FUZZY_MATCH_THRESHOLD: f32 = 0.8;

/// Fuzzy matches are discounted by this factor.
const FUZZY_CONFIDENCE_FACTOR: f32 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub version: String,

    /// `create_hash` of the exact base text
    pub base_hash: String,

    pub created_at: DateTime<Utc>,

    pub edits: Vec<Edit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Build a patch from `original` to `modified`. KEEP edits are left out.
pub async fn create_patch(
    original: &str,
    modified: &str,
    options: &DiffOptions,
    provider: Option<&dyn EmbeddingProvider>,
) -> AppResult<Patch> {
    let result = diff(original, modified, options, provider).await?;
    let edits: Vec<Edit> = result
        .edits
        .into_iter()
        .filter(|e| e.operation != EditOp::Keep)
        .collect();

    tracing::debug!("Created patch with {} edits", edits.len());

    Ok(Patch {
        version: PATCH_VERSION.to_string(),
        base_hash: create_hash(original),
        created_at: Utc::now(),
        edits,
        metadata: None,
    })
}

pub fn serialize_patch(patch: &Patch) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(patch)?)
}

/// Parse a patch, failing with a descriptive message when `version` or the
/// `edits` array is missing.
pub fn deserialize_patch(json: &str) -> AppResult<Patch> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| AppError::Patch(format!("not valid JSON: {}", e)))?;

    if !value.get("version").is_some_and(|v| v.is_string()) {
        return Err(AppError::Patch("missing required field 'version'".to_string()));
    }
    if !value.get("edits").is_some_and(|v| v.is_array()) {
        return Err(AppError::Patch("missing required array 'edits'".to_string()));
    }

    serde_json::from_value(value).map_err(|e| AppError::Patch(e.to_string()))
}

/// True when the patch was created against exactly `text`.
pub fn is_compatible(patch: &Patch, text: &str) -> bool {
    patch.base_hash == create_hash(text)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub segment: SegmentOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedEdit {
    pub edit: Edit,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedEdit {
    pub edit: Edit,
    pub reason: String,
}

/// Outcome of [`apply_patch`]; every edit lands in exactly one bucket.
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    pub text: String,
    pub applied: Vec<Edit>,
    pub adapted: Vec<AdaptedEdit>,
    pub failed: Vec<FailedEdit>,
}

/// A base unit and what the patch did to it.
#[derive(Debug, Clone)]
struct Slot {
    unit: SemanticUnit,
    deleted: bool,
    /// Claimed by a unit-scope REPLACE or DELETE
    claimed: bool,
    inserted_after: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    /// Before the first unit
    Start,
    Slot(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Exact(Target),
    Adapted(Target, f32),
}

/// Apply `patch` to `text`. Never fails; edits that cannot be placed are
/// listed in `failed`.
pub fn apply_patch(patch: &Patch, text: &str, options: &ApplyOptions) -> ApplyResult {
    if !is_compatible(patch, text) {
        tracing::debug!("Patch base hash differs from the target text, anchors may drift");
    }

    let mut slots: Vec<Slot> = segment(text, &options.segment)
        .units
        .into_iter()
        .map(|unit| Slot {
            unit,
            deleted: false,
            claimed: false,
            inserted_after: Vec::new(),
        })
        .collect();
    let mut leading: Vec<String> = Vec::new();
    let mut result = ApplyResult::default();

    // Word edits from one REPLACE carry context relative to the original
    // unit text, so they are applied right to left.
    let (word_edits, unit_edits): (Vec<&Edit>, Vec<&Edit>) = patch
        .edits
        .iter()
        .partition(|e| e.scope == EditScope::Word);

    for edit in unit_edits {
        apply_unit_edit(edit, &mut slots, &mut leading, &mut result);
    }
    for edit in word_edits.into_iter().rev() {
        apply_word_edit(edit, &mut slots, &mut result);
    }

    for failure in &result.failed {
        tracing::warn!(
            "Failed to apply {:?} edit (anchor '{}'): {}",
            failure.edit.operation,
            failure.edit.anchor,
            failure.reason
        );
    }

    result.text = assemble(slots, leading).trim().to_string();
    result
}

fn record(result: &mut ApplyResult, edit: &Edit, resolution: Resolution) {
    match resolution {
        Resolution::Exact(_) => result.applied.push(edit.clone()),
        Resolution::Adapted(_, confidence) => result.adapted.push(AdaptedEdit {
            edit: edit.clone(),
            confidence,
        }),
    }
}

fn fail(result: &mut ApplyResult, edit: &Edit, reason: &str) {
    result.failed.push(FailedEdit {
        edit: edit.clone(),
        reason: reason.to_string(),
    });
}

fn apply_unit_edit(
    edit: &Edit,
    slots: &mut [Slot],
    leading: &mut Vec<String>,
    result: &mut ApplyResult,
) {
    if edit.operation == EditOp::Move {
        fail(result, edit, "MOVE edits are not supported");
        return;
    }
    if !edit.is_well_formed() {
        fail(result, edit, "edit is missing required content");
        return;
    }

    let resolution = match edit.operation {
        EditOp::Insert => resolve_insert(edit, slots),
        _ => resolve_unit(edit, slots),
    };
    let Some(resolution) = resolution else {
        fail(result, edit, "anchor not found");
        return;
    };
    let target = match resolution {
        Resolution::Exact(t) | Resolution::Adapted(t, _) => t,
    };

    match (edit.operation, target) {
        (EditOp::Insert, Target::Start) => {
            leading.push(edit.new_content.clone().unwrap_or_default());
        }
        (EditOp::Insert, Target::Slot(i)) => {
            slots[i].inserted_after.push(edit.new_content.clone().unwrap_or_default());
        }
        (EditOp::Delete, Target::Slot(i)) => {
            slots[i].deleted = true;
            slots[i].claimed = true;
        }
        (EditOp::Replace, Target::Slot(i)) => {
            let new_content = edit.new_content.as_deref().unwrap_or_default();
            slots[i].unit = slots[i].unit.with_content(new_content);
            slots[i].claimed = true;
        }
        (EditOp::Keep, Target::Slot(_)) => {}
        _ => {
            fail(result, edit, "edit cannot target the document start");
            return;
        }
    }

    record(result, edit, resolution);
}

/// Locate the unit a REPLACE, DELETE or KEEP targets.
fn resolve_unit(edit: &Edit, slots: &[Slot]) -> Option<Resolution> {
    let available = |slot: &Slot| !slot.claimed && !slot.deleted;

    if let Some(i) = slots
        .iter()
        .position(|s| available(s) && s.unit.hash == edit.anchor)
    {
        return Some(Resolution::Exact(Target::Slot(i)));
    }

    if let Some(context) = edit.anchor_context.as_ref().filter(|c| !c.is_empty()) {
        let found = (0..slots.len())
            .find(|&i| available(&slots[i]) && context_matches(slots, i, context));
        if let Some(i) = found {
            return Some(Resolution::Adapted(Target::Slot(i), CONTEXT_CONFIDENCE));
        }
    }

    let old = edit.old_content.as_deref()?;
    slots
        .iter()
        .enumerate()
        .filter(|(_, s)| available(s))
        .map(|(i, s)| (i, levenshtein_similarity(old, &s.unit.content)))
        .filter(|&(_, sim)| sim >= FUZZY_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(i, sim)| Resolution::Adapted(Target::Slot(i), sim * FUZZY_CONFIDENCE_FACTOR))
}

/// The units around `i` carry the context's before/after contents.
fn context_matches(slots: &[Slot], i: usize, context: &AnchorContext) -> bool {
    let before_ok = match &context.before {
        Some(before) => i > 0 && slots[i - 1].unit.content == *before,
        None => true,
    };
    let after_ok = match &context.after {
        Some(after) => slots.get(i + 1).is_some_and(|s| s.unit.content == *after),
        None => true,
    };
    before_ok && after_ok
}

/// Locate the unit an INSERT goes after.
fn resolve_insert(edit: &Edit, slots: &[Slot]) -> Option<Resolution> {
    if edit.anchor.is_empty() {
        return Some(Resolution::Exact(Target::Start));
    }

    if let Some(i) = slots.iter().position(|s| s.unit.hash == edit.anchor) {
        return Some(Resolution::Exact(Target::Slot(i)));
    }

    let context = edit.anchor_context.as_ref()?;
    if let Some(before) = &context.before {
        if let Some(i) = slots.iter().position(|s| s.unit.content == *before) {
            return Some(Resolution::Adapted(Target::Slot(i), CONTEXT_CONFIDENCE));
        }
    }
    if let Some(after) = &context.after {
        if let Some(i) = slots.iter().position(|s| s.unit.content == *after) {
            let target = match i {
                0 => Target::Start,
                i => Target::Slot(i - 1),
            };
            return Some(Resolution::Adapted(target, CONTEXT_CONFIDENCE));
        }
    }

    None
}

fn apply_word_edit(edit: &Edit, slots: &mut [Slot], result: &mut ApplyResult) {
    if edit.operation == EditOp::Move || edit.operation == EditOp::Keep {
        fail(result, edit, "unsupported word-scope operation");
        return;
    }

    let empty = AnchorContext::default();
    let context = edit.anchor_context.as_ref().unwrap_or(&empty);
    let before = context.before.as_deref().unwrap_or("");
    let old = edit.old_content.as_deref().unwrap_or("");
    let new = edit.new_content.as_deref().unwrap_or("");

    let exact = slots
        .iter()
        .position(|s| !s.deleted && s.unit.hash == edit.anchor)
        .map(|i| (i, None));
    let located = exact.or_else(|| {
        // The unit changed; look for one still carrying the span with its prefix
        let needle = format!("{}{}", before, old);
        slots
            .iter()
            .position(|s| !s.deleted && !needle.is_empty() && s.unit.content.contains(&needle))
            .map(|i| (i, Some(CONTEXT_CONFIDENCE)))
    });
    let Some((i, adapted)) = located else {
        fail(result, edit, "anchor not found");
        return;
    };

    let content = &slots[i].unit.content;
    let Some(pos) = locate_span(content, before, old) else {
        fail(result, edit, "token span not found in anchored unit");
        return;
    };

    let mut updated = String::with_capacity(content.len() + new.len());
    updated.push_str(&content[..pos]);
    updated.push_str(new);
    updated.push_str(&content[pos + old.len()..]);

    // Keep the original hash so the remaining word edits still resolve
    let hash = slots[i].unit.hash.clone();
    slots[i].unit = slots[i].unit.with_content(&updated);
    slots[i].unit.hash = hash;

    let resolution = match adapted {
        None => Resolution::Exact(Target::Slot(i)),
        Some(confidence) => Resolution::Adapted(Target::Slot(i), confidence),
    };
    record(result, edit, resolution);
}

/// Byte offset of the span `old` inside `content`: right after `before` when
/// the content still starts with it, else the first occurrence after it.
fn locate_span(content: &str, before: &str, old: &str) -> Option<usize> {
    if content.starts_with(before) && content[before.len()..].starts_with(old) {
        return Some(before.len());
    }
    if old.is_empty() {
        return None;
    }
    let search_from = content.find(before).map_or(0, |p| p + before.len());
    content[search_from..]
        .find(old)
        .map(|p| p + search_from)
        .or_else(|| content.find(old))
}

/// Rebuild text from slots. Inserted units take over the spacing that
/// followed their anchor.
fn assemble(slots: Vec<Slot>, leading: Vec<String>) -> String {
    let mut units: Vec<SemanticUnit> = leading
        .iter()
        .enumerate()
        .map(|(i, content)| SemanticUnit::new(content, i))
        .collect();

    for slot in slots {
        let trailing = slot.unit.suffix.clone();
        let mut inserted: Vec<SemanticUnit> = slot
            .inserted_after
            .iter()
            .map(|content| SemanticUnit::new(content, slot.unit.index))
            .collect();

        if let Some(last) = inserted.last_mut() {
            last.suffix = trailing;
        }

        if !slot.deleted {
            let mut unit = slot.unit;
            if let Some(first) = inserted.first() {
                unit.suffix = separator(&first.kind).to_string();
            }
            units.push(unit);
        }

        let count = inserted.len();
        for (k, mut unit) in inserted.into_iter().enumerate() {
            if k + 1 < count {
                unit.suffix = separator(&unit.kind).to_string();
            }
            units.push(unit);
        }
    }

    reconstruct(&units)
}

fn separator(kind: &UnitKind) -> &'static str {
    match kind {
        UnitKind::Plain => " ",
        UnitKind::Heading { .. } | UnitKind::CodeBlock | UnitKind::ConflictMarker { .. } => {
            "\n\n"
        }
        UnitKind::ListItem { .. } => "\n",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;

    async fn make_patch(original: &str, modified: &str) -> Patch {
        let provider = TrigramProvider::new(256);
        create_patch(original, modified, &DiffOptions::default(), Some(&provider))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_patch_fields() {
        let patch = make_patch("One is here. Two is there.", "One is here. Three arrives.").await;
        assert_eq!(patch.version, "1.0.0");
        assert_eq!(patch.base_hash, create_hash("One is here. Two is there."));
        assert!(patch.edits.iter().all(|e| e.operation != EditOp::Keep));
        assert!(!patch.edits.is_empty());
    }

    #[tokio::test]
    async fn test_patch_round_trip() {
        let mut patch =
            make_patch("Alpha goes first. Beta follows.", "Alpha goes first. Gamma ends.").await;
        patch.metadata = Some(serde_json::json!({"author": "docs-team"}));

        let json = serialize_patch(&patch).unwrap();
        assert!(json.contains("\"baseHash\""));
        assert!(json.contains("\"createdAt\""));

        let restored = deserialize_patch(&json).unwrap();
        assert_eq!(restored, patch);
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let err = deserialize_patch(r#"{"baseHash":"00000000","edits":[]}"#).unwrap_err();
        assert!(err.to_string().contains("version"));

        let err = deserialize_patch(
            r#"{"version":"1.0.0","baseHash":"00000000","createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("edits"));

        assert!(deserialize_patch("not json").is_err());
    }

    #[tokio::test]
    async fn test_apply_to_same_base() {
        let original = "Alpha goes first. Beta follows. Gamma ends it.";
        let modified = "Alpha goes first. Gamma ends it. Delta joins late.";
        let patch = make_patch(original, modified).await;

        assert!(is_compatible(&patch, original));
        let result = apply_patch(&patch, original, &ApplyOptions::default());
        assert_eq!(result.text, modified);
        assert!(result.failed.is_empty());
        assert!(result.adapted.is_empty());
        assert_eq!(result.applied.len(), patch.edits.len());
    }

    #[tokio::test]
    async fn test_apply_adapts_through_context() {
        let original = "Alpha goes first. Beta follows. Gamma ends it.";
        let modified = "Alpha goes first. Gamma ends it.";
        let patch = make_patch(original, modified).await;

        // The deleted sentence was reworded in the target, so its hash is gone
        let drifted = "Alpha goes first. Beta follows closely behind. Gamma ends it.";
        assert!(!is_compatible(&patch, drifted));

        let result = apply_patch(&patch, drifted, &ApplyOptions::default());
        assert_eq!(result.text, "Alpha goes first. Gamma ends it.");
        assert_eq!(result.adapted.len(), 1);
        assert_eq!(result.adapted[0].confidence, CONTEXT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_apply_fuzzy_old_content() {
        let patch = Patch {
            version: PATCH_VERSION.to_string(),
            base_hash: create_hash("x"),
            created_at: Utc::now(),
            edits: vec![Edit::replace(
                &SemanticUnit::new("The server restarts every night.", 0),
                "The server restarts weekly.",
                0.9,
                AnchorContext::default(),
            )],
            metadata: None,
        };

        let target = "The server restarts every nights.";
        let result = apply_patch(&patch, target, &ApplyOptions::default());
        assert_eq!(result.text, "The server restarts weekly.");
        assert_eq!(result.adapted.len(), 1);
        assert!(result.adapted[0].confidence < CONTEXT_CONFIDENCE + 0.1);
    }

    #[test]
    fn test_unresolvable_and_move_edits_fail() {
        let mut move_edit =
            Edit::delete(&SemanticUnit::new("Nowhere.", 0), AnchorContext::default());
        move_edit.operation = EditOp::Move;
        let missing = Edit::delete(
            &SemanticUnit::new("Completely absent sentence.", 0),
            AnchorContext::default(),
        );

        let patch = Patch {
            version: PATCH_VERSION.to_string(),
            base_hash: create_hash(""),
            created_at: Utc::now(),
            edits: vec![move_edit, missing],
            metadata: None,
        };

        let result = apply_patch(&patch, "Something else entirely.", &ApplyOptions::default());
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.text, "Something else entirely.");
    }

    #[tokio::test]
    async fn test_word_scope_patch() {
        let provider = TrigramProvider::new(256);
        let options = DiffOptions {
            granularity: crate::diff::DiffGranularity::Word,
            ..Default::default()
        };
        let original = "Install the package with cargo before running tests.";
        let modified = "Install the package using cargo before running all tests.";

        let patch = create_patch(original, modified, &options, Some(&provider))
            .await
            .unwrap();
        assert!(patch.edits.iter().all(|e| e.scope == EditScope::Word));

        let result = apply_patch(&patch, original, &ApplyOptions::default());
        assert_eq!(result.text, modified);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_insert_at_start() {
        let patch = make_patch("Body text.", "Preface here. Body text.").await;
        let result = apply_patch(&patch, "Body text.", &ApplyOptions::default());
        assert_eq!(result.text, "Preface here. Body text.");
    }
}
