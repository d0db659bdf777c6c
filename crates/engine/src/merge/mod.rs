//! Three-way merge of natural-language documents.
//!
//! A is the common ancestor, B the upgraded version and C the customized
//! one. Every unit of A is classified by what B and C did to it. Units both
//! sides changed go through the word-level merge and, when that cannot
//! settle them, through subsumption and the configured conflict strategy.

pub mod resolver;
pub mod word;

pub use resolver::{apply_resolver, ConflictResolver};
pub use word::{inline_marker, word_merge_3way, ConflictRange, WordMergeResult};

use crate::align::{align, Alignment, AlignOptions, PairKind};
use crate::embeddings::{default_provider, CachedProvider, EmbeddingProvider};
use crate::segment::{reconstruct, segment, SegmentOptions, SemanticUnit};
use crate::similarity::levenshtein_similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use textmerge_core::{AppError, AppResult};

/// Above this, two rewrites are treated as the same content.
const SUBSUMPTION_SIMILARITY: f32 = 0.95;

const WORD_MERGE_CONFIDENCE: f32 = 0.95;
const SUBSUMPTION_CONFIDENCE: f32 = 0.9;
const STRATEGY_CONFIDENCE: f32 = 0.7;
const CONCATENATE_CONFIDENCE: f32 = 0.5;
const EXTERNAL_CONFIDENCE: f32 = 1.0;

/// How sentence-level conflicts are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    PreferA,
    PreferB,
    PreferC,
    /// B's text, a newline, then C's text
    Concatenate,
    /// Leave a conflict block in the output
    #[default]
    Defer,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::PreferA => "prefer-a",
            ConflictStrategy::PreferB => "prefer-b",
            ConflictStrategy::PreferC => "prefer-c",
            ConflictStrategy::Concatenate => "concatenate",
            ConflictStrategy::Defer => "defer",
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prefer-a" => Ok(ConflictStrategy::PreferA),
            "prefer-b" => Ok(ConflictStrategy::PreferB),
            "prefer-c" => Ok(ConflictStrategy::PreferC),
            "concatenate" => Ok(ConflictStrategy::Concatenate),
            "defer" => Ok(ConflictStrategy::Defer),
            other => Err(AppError::Config(format!(
                "Unknown conflict strategy: {}. Supported: prefer-a, prefer-b, prefer-c, concatenate, defer",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub segment: SegmentOptions,
    pub align: AlignOptions,
    pub conflict_strategy: ConflictStrategy,
}

/// A unit both sides changed in ways the merge could not reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub id: String,

    /// Index of the contested unit in A
    pub unit_index: usize,

    pub original: String,

    /// B's text, empty when B deleted the unit
    pub upgraded: String,

    /// C's text, empty when C deleted the unit
    pub customized: String,

    /// Block spliced into the merged text in place of the unit
    pub marker: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub word_conflicts: Vec<ConflictRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    Strategy,
    Subsumption,
    WordMerge,
    Concatenate,
    External,
}

/// How a contested unit was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub conflict_id: String,
    pub content: String,
    pub source: ResolutionSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ConflictStrategy>,

    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub unchanged: usize,
    pub upgraded: usize,
    pub preserved: usize,
    pub removed: usize,
    /// Unresolved conflicts left in `merged`
    pub conflicts: usize,
    pub auto_resolved: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub merged: String,
    pub conflicts: Vec<Conflict>,
    pub resolutions: Vec<Resolution>,
    pub stats: MergeStats,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Replace the conflict block of `conflict_id` with `text`.
    pub fn resolve_conflict(&mut self, conflict_id: &str, text: &str) -> AppResult<()> {
        self.settle(Resolution {
            conflict_id: conflict_id.to_string(),
            content: text.to_string(),
            source: ResolutionSource::External,
            strategy: None,
            confidence: EXTERNAL_CONFIDENCE,
        })
    }

    pub(crate) fn settle(&mut self, resolution: Resolution) -> AppResult<()> {
        let position = self
            .conflicts
            .iter()
            .position(|c| c.id == resolution.conflict_id)
            .ok_or_else(|| AppError::ConflictNotFound(resolution.conflict_id.clone()))?;

        let conflict = self.conflicts.remove(position);
        self.merged = self.merged.replacen(&conflict.marker, &resolution.content, 1);
        self.stats.conflicts = self.stats.conflicts.saturating_sub(1);

        tracing::debug!(
            "Resolved {} ({:?}, confidence {:.2})",
            conflict.id,
            resolution.source,
            resolution.confidence
        );
        self.resolutions.push(resolution);
        Ok(())
    }
}

/// Block marking a deferred conflict in merged text.
pub fn conflict_block(upgraded: &str, customized: &str) -> String {
    format!(
        "<<<<<<< B\n{}\n=======\n{}\n>>>>>>> C",
        upgraded, customized
    )
}

/// Merge the changes B and C made to A.
///
/// `provider` is wrapped in a cache for the duration of the call, so A's
/// units are embedded once for both alignments.
pub async fn merge(
    a: &str,
    b: &str,
    c: &str,
    options: &MergeOptions,
    provider: Option<Arc<dyn EmbeddingProvider>>,
) -> AppResult<MergeResult> {
    let base = segment(a, &options.segment).units;
    let upgraded = segment(b, &options.segment).units;
    let customized = segment(c, &options.segment).units;

    if base.is_empty() && upgraded.is_empty() && customized.is_empty() {
        return Ok(MergeResult::default());
    }

    let cached = CachedProvider::new(
        provider.unwrap_or_else(default_provider),
        base.len() + upgraded.len() + customized.len(),
    );
    let provider: &dyn EmbeddingProvider = &cached;

    let to_b = align(&base, &upgraded, &options.align, Some(provider)).await?;
    let to_c = align(&base, &customized, &options.align, Some(provider)).await?;

    let mut reconciler = Reconciler::new(
        options.conflict_strategy,
        SideView::build(&to_b, &upgraded, base.len()),
        SideView::build(&to_c, &customized, base.len()),
    );
    for unit in &base {
        reconciler.reconcile_unit(unit);
    }
    reconciler.place_insertions(&customized);

    let result = reconciler.finish();
    tracing::debug!(
        "Merged {} base units: {} unchanged, {} upgraded, {} preserved, {} removed, {} auto-resolved, {} conflicts",
        base.len(),
        result.stats.unchanged,
        result.stats.upgraded,
        result.stats.preserved,
        result.stats.removed,
        result.stats.auto_resolved,
        result.stats.conflicts
    );

    Ok(result)
}

/// What one side holds in place of a unit of A.
#[derive(Debug, Clone, Copy)]
enum Counterpart<'a> {
    Paired {
        unit: &'a SemanticUnit,
        kind: PairKind,
    },
    Deleted,
}

/// A unit only one side has, with the number of A units preceding it.
#[derive(Debug)]
struct Insertion<'a> {
    unit: &'a SemanticUnit,
    gap: usize,
    /// Whitespace separating the unit from its predecessor in its own side
    lead: &'a str,
}

impl Insertion<'_> {
    /// Sits where the unit `index` of A used to be.
    fn replaces(&self, index: usize) -> bool {
        self.gap == index || self.gap == index + 1
    }
}

/// One side's alignment against A, indexed by A unit.
#[derive(Debug)]
struct SideView<'a> {
    by_source: Vec<Counterpart<'a>>,
    insertions: Vec<Insertion<'a>>,
}

impl<'a> SideView<'a> {
    fn build(alignment: &'a Alignment, side: &'a [SemanticUnit], source_len: usize) -> Self {
        let mut by_source = vec![Counterpart::Deleted; source_len];
        let mut insertions = Vec::new();
        let mut seen = 0;

        for pair in &alignment.pairs {
            match (&pair.source, &pair.target) {
                (Some(source), target) => {
                    if let Some(slot) = by_source.get_mut(source.index) {
                        *slot = match target {
                            Some(unit) => Counterpart::Paired {
                                unit,
                                kind: pair.kind,
                            },
                            None => Counterpart::Deleted,
                        };
                    }
                    seen = seen.max(source.index + 1);
                }
                (None, Some(unit)) => {
                    let lead = unit
                        .index
                        .checked_sub(1)
                        .and_then(|previous| side.get(previous))
                        .map_or("", |previous| previous.suffix.as_str());
                    insertions.push(Insertion {
                        unit,
                        gap: seen,
                        lead,
                    });
                }
                (None, None) => {}
            }
        }

        Self {
            by_source,
            insertions,
        }
    }

    fn counterpart(&self, index: usize) -> Counterpart<'a> {
        self.by_source
            .get(index)
            .copied()
            .unwrap_or(Counterpart::Deleted)
    }

    fn deleted(&self, index: usize) -> bool {
        matches!(self.counterpart(index), Counterpart::Deleted)
    }

    fn has_replacement(&self, consumed: &HashSet<usize>, index: usize) -> bool {
        self.insertions
            .iter()
            .enumerate()
            .any(|(position, insertion)| !consumed.contains(&position) && insertion.replaces(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitCase {
    Unchanged,
    Upgraded,
    Preserved,
    Conflict,
}

fn changed(original: &SemanticUnit, counterpart: Counterpart<'_>) -> bool {
    match counterpart {
        Counterpart::Deleted => true,
        Counterpart::Paired { unit, kind } => {
            kind == PairKind::Modification || unit.content != original.content
        }
    }
}

fn classify(original: &SemanticUnit, b: Counterpart<'_>, c: Counterpart<'_>) -> UnitCase {
    match (changed(original, b), changed(original, c)) {
        (false, false) => UnitCase::Unchanged,
        (true, false) => UnitCase::Upgraded,
        (false, true) => UnitCase::Preserved,
        (true, true) => UnitCase::Conflict,
    }
}

/// Take an unconsumed insertion standing in for a rewrite the alignment
/// split into a deletion and an insertion: one in the unit's own gap when
/// there is one, else the closest to `index` in the side's own sequence.
fn recover<'a>(
    view: &SideView<'a>,
    consumed: &mut HashSet<usize>,
    index: usize,
) -> Option<&'a SemanticUnit> {
    let open: Vec<(usize, &Insertion<'a>)> = view
        .insertions
        .iter()
        .enumerate()
        .filter(|(position, _)| !consumed.contains(position))
        .collect();
    let distance = |entry: &&(usize, &Insertion<'a>)| entry.1.unit.index.abs_diff(index);

    let (position, insertion) = open
        .iter()
        .filter(|(_, insertion)| insertion.replaces(index))
        .min_by_key(distance)
        .or_else(|| open.iter().min_by_key(distance))
        .copied()?;

    consumed.insert(position);
    Some(insertion.unit)
}

/// The more complete of two rewrites when one covers the other.
fn subsuming_side<'t>(b: &'t str, c: &'t str) -> Option<&'t str> {
    if b.is_empty() || c.is_empty() {
        return None;
    }
    if b.contains(c) || c.contains(b) || levenshtein_similarity(b, c) > SUBSUMPTION_SIMILARITY {
        if c.chars().count() > b.chars().count() {
            Some(c)
        } else {
            Some(b)
        }
    } else {
        None
    }
}

/// Output unit with its position key. A unit `i` of A sorts at `2i + 1`,
/// an insertion after `g` units of A at `2g`. Units sharing a slot keep
/// input order: B before C, then each side's own sequence. No hash
/// tiebreak, so equal positions never reorder by content.
#[derive(Debug)]
struct Emitted {
    slot: usize,
    side: u8,
    seq: usize,
    unit: SemanticUnit,
    /// Separator the unit had in its own side, empty for units of A's slots
    lead: String,
}

const SIDE_BASE: u8 = 0;
const SIDE_B: u8 = 1;
const SIDE_C: u8 = 2;

struct Reconciler<'a> {
    strategy: ConflictStrategy,
    b: SideView<'a>,
    c: SideView<'a>,
    consumed_b: HashSet<usize>,
    consumed_c: HashSet<usize>,
    emitted: Vec<Emitted>,
    conflicts: Vec<Conflict>,
    resolutions: Vec<Resolution>,
    stats: MergeStats,
    next_conflict: usize,
}

impl<'a> Reconciler<'a> {
    fn new(strategy: ConflictStrategy, b: SideView<'a>, c: SideView<'a>) -> Self {
        Self {
            strategy,
            b,
            c,
            consumed_b: HashSet::new(),
            consumed_c: HashSet::new(),
            emitted: Vec::new(),
            conflicts: Vec::new(),
            resolutions: Vec::new(),
            stats: MergeStats::default(),
            next_conflict: 1,
        }
    }

    fn emit(&mut self, index: usize, unit: SemanticUnit) {
        self.emitted.push(Emitted {
            slot: 2 * index + 1,
            side: SIDE_BASE,
            seq: self.emitted.len(),
            unit,
            lead: String::new(),
        });
    }

    fn next_id(&mut self) -> String {
        let id = format!("conflict-{}", self.next_conflict);
        self.next_conflict += 1;
        id
    }

    fn reconcile_unit(&mut self, original: &SemanticUnit) {
        let index = original.index;
        let b = self.b.counterpart(index);
        let c = self.c.counterpart(index);

        match classify(original, b, c) {
            UnitCase::Unchanged => {
                let unit = match b {
                    Counterpart::Paired { unit, .. } => unit,
                    Counterpart::Deleted => original,
                };
                self.emit(index, unit.clone());
                self.stats.unchanged += 1;
            }
            UnitCase::Upgraded => {
                if let Counterpart::Paired { unit, .. } = b {
                    self.emit(index, unit.clone());
                }
                self.stats.upgraded += 1;
            }
            UnitCase::Preserved => match c {
                Counterpart::Paired { unit, .. } => {
                    self.emit(index, unit.clone());
                    self.stats.preserved += 1;
                }
                Counterpart::Deleted => self.stats.removed += 1,
            },
            UnitCase::Conflict => self.reconcile_conflict(original, b, c),
        }
    }

    fn reconcile_conflict(
        &mut self,
        original: &SemanticUnit,
        b: Counterpart<'a>,
        c: Counterpart<'a>,
    ) {
        let index = original.index;
        if matches!((b, c), (Counterpart::Deleted, Counterpart::Deleted))
            && !self.b.has_replacement(&self.consumed_b, index)
            && !self.c.has_replacement(&self.consumed_c, index)
        {
            self.stats.removed += 1;
            return;
        }

        let b_text = match b {
            Counterpart::Paired { unit, .. } => Some(unit.content.clone()),
            Counterpart::Deleted => {
                recover(&self.b, &mut self.consumed_b, index).map(|u| u.content.clone())
            }
        };
        let c_text = match c {
            Counterpart::Paired { unit, .. } => Some(unit.content.clone()),
            Counterpart::Deleted => {
                recover(&self.c, &mut self.consumed_c, index).map(|u| u.content.clone())
            }
        };

        match (b_text, c_text) {
            (None, None) => self.stats.removed += 1,
            (Some(b), Some(c)) if b == c => {
                self.emit(index, original.with_content(&b));
                self.stats.upgraded += 1;
            }
            (Some(b), Some(c)) => self.merge_words(original, b, c),
            (b, c) => self.escalate(original, b.as_deref(), c.as_deref(), Vec::new()),
        }
    }

    fn merge_words(&mut self, original: &SemanticUnit, b: String, c: String) {
        let result = word_merge_3way(&original.content, &b, &c);
        if result.has_conflict {
            return self.escalate(
                original,
                Some(b.as_str()),
                Some(c.as_str()),
                result.conflict_ranges,
            );
        }

        let picked_b = result.merged == b;
        let picked_c = result.merged == c;
        if picked_b && self.strategy == ConflictStrategy::PreferC {
            self.auto_resolve(original, c, ResolutionSource::Strategy, STRATEGY_CONFIDENCE);
        } else if picked_c && self.strategy == ConflictStrategy::PreferB {
            self.auto_resolve(original, b, ResolutionSource::Strategy, STRATEGY_CONFIDENCE);
        } else if picked_b || picked_c || self.strategy == ConflictStrategy::Defer {
            self.auto_resolve(
                original,
                result.merged,
                ResolutionSource::WordMerge,
                WORD_MERGE_CONFIDENCE,
            );
        } else {
            self.escalate(original, Some(b.as_str()), Some(c.as_str()), Vec::new());
        }
    }

    /// Sentence-level decision: subsumption first, then the strategy.
    fn escalate(
        &mut self,
        original: &SemanticUnit,
        b: Option<&str>,
        c: Option<&str>,
        word_conflicts: Vec<ConflictRange>,
    ) {
        if let Some(winner) = b.zip(c).and_then(|(b, c)| subsuming_side(b, c)) {
            let winner = winner.to_string();
            return self.auto_resolve(
                original,
                winner,
                ResolutionSource::Subsumption,
                SUBSUMPTION_CONFIDENCE,
            );
        }

        let side = |text: Option<&str>| text.unwrap_or_default().to_string();
        match self.strategy {
            ConflictStrategy::PreferA => self.auto_resolve(
                original,
                original.content.clone(),
                ResolutionSource::Strategy,
                STRATEGY_CONFIDENCE,
            ),
            ConflictStrategy::PreferB => {
                self.auto_resolve(original, side(b), ResolutionSource::Strategy, STRATEGY_CONFIDENCE)
            }
            ConflictStrategy::PreferC => {
                self.auto_resolve(original, side(c), ResolutionSource::Strategy, STRATEGY_CONFIDENCE)
            }
            ConflictStrategy::Concatenate => {
                let joined = [b, c].into_iter().flatten().collect::<Vec<_>>().join("\n");
                self.auto_resolve(
                    original,
                    joined,
                    ResolutionSource::Concatenate,
                    CONCATENATE_CONFIDENCE,
                )
            }
            ConflictStrategy::Defer => self.defer(original, side(b), side(c), word_conflicts),
        }
    }

    fn auto_resolve(
        &mut self,
        original: &SemanticUnit,
        content: String,
        source: ResolutionSource,
        confidence: f32,
    ) {
        let conflict_id = self.next_id();
        if !content.trim().is_empty() {
            self.emit(original.index, original.with_content(&content));
        }

        let strategy = matches!(
            source,
            ResolutionSource::Strategy | ResolutionSource::Concatenate
        )
        .then_some(self.strategy);

        self.resolutions.push(Resolution {
            conflict_id,
            content,
            source,
            strategy,
            confidence,
        });
        self.stats.auto_resolved += 1;
    }

    fn defer(
        &mut self,
        original: &SemanticUnit,
        upgraded: String,
        customized: String,
        word_conflicts: Vec<ConflictRange>,
    ) {
        let id = self.next_id();
        let marker = conflict_block(&upgraded, &customized);
        self.emit(
            original.index,
            SemanticUnit::conflict_marker(original, &id, &marker),
        );

        self.conflicts.push(Conflict {
            id,
            unit_index: original.index,
            original: original.content.clone(),
            upgraded,
            customized,
            marker,
            word_conflicts,
        });
        self.stats.conflicts += 1;
    }

    /// Units only B or only C added that no conflict claimed.
    fn place_insertions(&mut self, customized: &[SemanticUnit]) {
        let c_hashes: HashSet<&str> = customized.iter().map(|u| u.hash.as_str()).collect();

        for (position, insertion) in self.b.insertions.iter().enumerate() {
            if self.consumed_b.contains(&position) {
                continue;
            }
            if c_hashes.contains(insertion.unit.hash.as_str()) {
                tracing::debug!("Skipping B insertion already present in C: {}", insertion.unit.hash);
                continue;
            }
            if self.strategy == ConflictStrategy::PreferC
                && deleted_by_both(&self.b, &self.c, insertion.gap)
            {
                continue;
            }
            self.emitted.push(Emitted {
                slot: 2 * insertion.gap,
                side: SIDE_B,
                seq: position,
                unit: insertion.unit.clone(),
                lead: insertion.lead.to_string(),
            });
            self.stats.upgraded += 1;
        }

        for (position, insertion) in self.c.insertions.iter().enumerate() {
            if self.consumed_c.contains(&position) {
                continue;
            }
            if self.strategy == ConflictStrategy::PreferB
                && deleted_by_both(&self.b, &self.c, insertion.gap)
            {
                continue;
            }
            self.emitted.push(Emitted {
                slot: 2 * insertion.gap,
                side: SIDE_C,
                seq: position,
                unit: insertion.unit.clone(),
                lead: insertion.lead.to_string(),
            });
            self.stats.preserved += 1;
        }
    }

    fn finish(self) -> MergeResult {
        let mut emitted = self.emitted;
        emitted.sort_by_key(|e| (e.slot, e.side, e.seq));

        let mut units: Vec<SemanticUnit> = Vec::with_capacity(emitted.len());
        for Emitted { mut unit, lead, .. } in emitted {
            // The predecessor may come from the other side, where it ended
            // the text or a line, so it can carry a weaker break than the
            // inserted unit had in its own side
            if let Some(previous) = units.last_mut() {
                if unit.prefix.is_empty() && line_breaks(&lead) > line_breaks(&previous.suffix) {
                    previous.suffix.clear();
                    unit.prefix = lead;
                }
            }
            units.push(unit);
        }

        MergeResult {
            merged: reconstruct(&units).trim().to_string(),
            conflicts: self.conflicts,
            resolutions: self.resolutions,
            stats: self.stats,
        }
    }
}

fn line_breaks(whitespace: &str) -> usize {
    whitespace.matches('\n').count()
}

/// An insertion at `gap` replaces content when an adjacent unit of A is
/// gone from both sides.
fn deleted_by_both(b: &SideView<'_>, c: &SideView<'_>, gap: usize) -> bool {
    let before = gap.checked_sub(1);
    before
        .into_iter()
        .chain(std::iter::once(gap))
        .filter(|&index| index < b.by_source.len())
        .any(|index| b.deleted(index) && c.deleted(index))
}
