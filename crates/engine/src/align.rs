//! Alignment of two unit sequences.
//!
//! Pairs every unit of a source sequence with a unit of the target sequence
//! (match or modification) or leaves it unpaired (deletion or insertion).

use crate::embeddings::{default_provider, EmbeddingProvider};
use crate::segment::SemanticUnit;
use crate::similarity::cosine_similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use textmerge_core::{AppError, AppResult};

/// Score for pairing two units below the match threshold.
const MISMATCH_PENALTY: f32 = -0.5;

/// Score for leaving a unit unpaired.
const GAP_PENALTY: f32 = 0.1;

/// Semantic pairs at or above this similarity are tagged as matches.
const SEMANTIC_MATCH_SIMILARITY: f32 = 0.99;

const TIE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignStrategy {
    /// Order-preserving dynamic program
    Sequential,
    /// Greedy best-similarity pairing, ignores order
    Semantic,
    /// Sequential, then deletion/insertion pairs re-paired as moves
    #[default]
    Hybrid,
}

impl std::str::FromStr for AlignStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(AlignStrategy::Sequential),
            "semantic" => Ok(AlignStrategy::Semantic),
            "hybrid" => Ok(AlignStrategy::Hybrid),
            other => Err(AppError::Config(format!(
                "Unknown alignment strategy: {}. Supported: sequential, semantic, hybrid",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignOptions {
    pub strategy: AlignStrategy,

    /// Minimum similarity for two units to be paired
    pub match_threshold: f32,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            strategy: AlignStrategy::Hybrid,
            match_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairKind {
    Match,
    Modification,
    Insertion,
    Deletion,
}

/// A source unit related to a target unit. Insertions have no source,
/// deletions no target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub kind: PairKind,
    pub source: Option<SemanticUnit>,
    pub target: Option<SemanticUnit>,
    pub similarity: f32,
}

impl AlignedPair {
    pub fn paired(
        kind: PairKind,
        source: SemanticUnit,
        target: SemanticUnit,
        similarity: f32,
    ) -> Self {
        Self {
            kind,
            source: Some(source),
            target: Some(target),
            similarity,
        }
    }

    pub fn deletion(source: SemanticUnit) -> Self {
        Self {
            kind: PairKind::Deletion,
            source: Some(source),
            target: None,
            similarity: 0.0,
        }
    }

    pub fn insertion(target: SemanticUnit) -> Self {
        Self {
            kind: PairKind::Insertion,
            source: None,
            target: Some(target),
            similarity: 0.0,
        }
    }

    /// Both sides present with identical content.
    pub fn is_unchanged(&self) -> bool {
        match (&self.source, &self.target) {
            (Some(s), Some(t)) => s.content == t.content,
            _ => false,
        }
    }

    fn key(&self) -> Option<(String, String)> {
        match (&self.source, &self.target) {
            (Some(s), Some(t)) => Some((s.hash.clone(), t.hash.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    pub unmatched_source: Vec<SemanticUnit>,
    pub unmatched_target: Vec<SemanticUnit>,
}

impl Alignment {
    fn from_pairs(pairs: Vec<AlignedPair>) -> Self {
        let unmatched_source = pairs
            .iter()
            .filter(|p| p.kind == PairKind::Deletion)
            .filter_map(|p| p.source.clone())
            .collect();
        let unmatched_target = pairs
            .iter()
            .filter(|p| p.kind == PairKind::Insertion)
            .filter_map(|p| p.target.clone())
            .collect();

        Self {
            pairs,
            unmatched_source,
            unmatched_target,
        }
    }
}

/// Align `source` against `target`.
///
/// Uses `provider` when given, otherwise the process-wide default. All unit
/// texts go to the provider in one batch, source first.
pub async fn align(
    source: &[SemanticUnit],
    target: &[SemanticUnit],
    options: &AlignOptions,
    provider: Option<&dyn EmbeddingProvider>,
) -> AppResult<Alignment> {
    if source.is_empty() || target.is_empty() {
        let pairs = source
            .iter()
            .cloned()
            .map(AlignedPair::deletion)
            .chain(target.iter().cloned().map(AlignedPair::insertion))
            .collect();
        return Ok(Alignment::from_pairs(pairs));
    }

    let fallback;
    let provider = match provider {
        Some(p) => p,
        None => {
            fallback = default_provider();
            fallback.as_ref()
        }
    };

    let matrix = similarity_matrix(source, target, provider).await?;
    let threshold = options.match_threshold;

    let pairs = match options.strategy {
        AlignStrategy::Sequential => align_sequential(source, target, &matrix, threshold),
        AlignStrategy::Semantic => align_semantic(source, target, &matrix, threshold),
        AlignStrategy::Hybrid => {
            let sequential = align_sequential(source, target, &matrix, threshold);
            reclassify_moves(sequential, &matrix, threshold)
        }
    };

    tracing::debug!(
        "Aligned {} source and {} target units into {} pairs ({:?}, provider={})",
        source.len(),
        target.len(),
        pairs.len(),
        options.strategy,
        provider.provider_name()
    );

    Ok(Alignment::from_pairs(pairs))
}

/// |source| x |target| similarities. Units with equal hashes score 1.0.
async fn similarity_matrix(
    source: &[SemanticUnit],
    target: &[SemanticUnit],
    provider: &dyn EmbeddingProvider,
) -> AppResult<Vec<Vec<f32>>> {
    let texts: Vec<String> = source
        .iter()
        .chain(target.iter())
        .map(|u| u.content.clone())
        .collect();

    let vectors = provider.embed_batch(&texts).await?;
    if vectors.len() != texts.len() {
        return Err(AppError::Embedding(format!(
            "Provider '{}' returned {} embeddings for {} texts",
            provider.provider_name(),
            vectors.len(),
            texts.len()
        )));
    }

    let (source_vectors, target_vectors) = vectors.split_at(source.len());
    let mut matrix = vec![vec![0.0; target.len()]; source.len()];
    for (i, s) in source.iter().enumerate() {
        for (j, t) in target.iter().enumerate() {
            matrix[i][j] = if s.hash == t.hash {
                1.0
            } else {
                cosine_similarity(&source_vectors[i], &target_vectors[j])?
            };
        }
    }

    Ok(matrix)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Diagonal,
    Up,
    Left,
}

fn paired_kind(similarity: f32, threshold: f32) -> PairKind {
    if similarity >= threshold {
        PairKind::Match
    } else {
        PairKind::Modification
    }
}

/// Edit-distance style dynamic program over the similarity matrix.
fn align_sequential(
    source: &[SemanticUnit],
    target: &[SemanticUnit],
    matrix: &[Vec<f32>],
    threshold: f32,
) -> Vec<AlignedPair> {
    let (m, n) = (source.len(), target.len());
    let mut score = vec![vec![0.0f32; n + 1]; m + 1];
    let mut step = vec![vec![Step::Diagonal; n + 1]; m + 1];

    for i in 1..=m {
        score[i][0] = score[i - 1][0] - GAP_PENALTY;
        step[i][0] = Step::Up;
    }
    for j in 1..=n {
        score[0][j] = score[0][j - 1] - GAP_PENALTY;
        step[0][j] = Step::Left;
    }

    for i in 1..=m {
        for j in 1..=n {
            let sim = matrix[i - 1][j - 1];
            let gain = if sim >= threshold { sim } else { MISMATCH_PENALTY };
            let diagonal = score[i - 1][j - 1] + gain;
            let up = score[i - 1][j] - GAP_PENALTY;
            let left = score[i][j - 1] - GAP_PENALTY;

            // Ties prefer diagonal, then up, then left
            let diagonal_wins = diagonal + TIE_EPSILON >= up && diagonal + TIE_EPSILON >= left;
            let (best, chosen) = if diagonal_wins {
                (diagonal, Step::Diagonal)
            } else if up + TIE_EPSILON >= left {
                (up, Step::Up)
            } else {
                (left, Step::Left)
            };
            score[i][j] = best;
            step[i][j] = chosen;
        }
    }

    let mut pairs = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        match step[i][j] {
            Step::Diagonal if i > 0 && j > 0 => {
                let sim = matrix[i - 1][j - 1];
                pairs.push(AlignedPair::paired(
                    paired_kind(sim, threshold),
                    source[i - 1].clone(),
                    target[j - 1].clone(),
                    sim,
                ));
                i -= 1;
                j -= 1;
            }
            Step::Up | Step::Diagonal if i > 0 => {
                pairs.push(AlignedPair::deletion(source[i - 1].clone()));
                i -= 1;
            }
            _ => {
                pairs.push(AlignedPair::insertion(target[j - 1].clone()));
                j -= 1;
            }
        }
    }

    pairs.reverse();
    pairs
}

/// Greedy pairing by descending similarity, then ordered by target position.
fn align_semantic(
    source: &[SemanticUnit],
    target: &[SemanticUnit],
    matrix: &[Vec<f32>],
    threshold: f32,
) -> Vec<AlignedPair> {
    let mut candidates: Vec<(usize, usize, f32)> = matrix
        .iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(move |&(_, &sim)| sim >= threshold)
                .map(move |(j, &sim)| (i, j, sim))
        })
        .collect();
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut source_target: Vec<Option<usize>> = vec![None; source.len()];
    let mut target_used = vec![false; target.len()];
    for (i, j, _) in candidates {
        if source_target[i].is_none() && !target_used[j] {
            source_target[i] = Some(j);
            target_used[j] = true;
        }
    }

    // Sort keys: paired units and insertions by target index; a deletion
    // sits just after the target of the nearest preceding paired source.
    let mut keyed: Vec<(f64, AlignedPair)> = Vec::with_capacity(source.len() + target.len());
    let mut last_target: Option<usize> = None;
    for (i, paired) in source_target.iter().enumerate() {
        match paired {
            Some(j) => {
                let sim = matrix[i][*j];
                let kind = if sim >= SEMANTIC_MATCH_SIMILARITY {
                    PairKind::Match
                } else {
                    PairKind::Modification
                };
                keyed.push((
                    *j as f64,
                    AlignedPair::paired(kind, source[i].clone(), target[*j].clone(), sim),
                ));
                last_target = Some(last_target.map_or(*j, |t| t.max(*j)));
            }
            None => {
                let key = last_target.map_or(-0.5, |t| t as f64 + 0.5);
                keyed.push((key, AlignedPair::deletion(source[i].clone())));
            }
        }
    }
    for (j, used) in target_used.iter().enumerate() {
        if !used {
            keyed.push((j as f64, AlignedPair::insertion(target[j].clone())));
        }
    }

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, pair)| pair).collect()
}

/// Re-pair deletions with insertions of similar content as modifications at
/// the deletion's position. A candidate whose (source, target) hash key is
/// already paired elsewhere is left alone.
fn reclassify_moves(
    pairs: Vec<AlignedPair>,
    matrix: &[Vec<f32>],
    threshold: f32,
) -> Vec<AlignedPair> {
    let mut existing: HashSet<(String, String)> =
        pairs.iter().filter_map(AlignedPair::key).collect();

    let insertions: Vec<usize> = pairs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind == PairKind::Insertion)
        .map(|(idx, _)| idx)
        .collect();
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut replacements: Vec<(usize, usize, f32)> = Vec::new();

    for (del_idx, pair) in pairs.iter().enumerate() {
        let Some(source) = pair.source.as_ref().filter(|_| pair.kind == PairKind::Deletion) else {
            continue;
        };

        let mut best: Option<(usize, f32)> = None;
        for &ins_idx in &insertions {
            if consumed.contains(&ins_idx) {
                continue;
            }
            let Some(target) = pairs[ins_idx].target.as_ref() else {
                continue;
            };
            let sim = matrix
                .get(source.index)
                .and_then(|row| row.get(target.index))
                .copied()
                .unwrap_or(0.0);
            if sim >= threshold && best.map_or(true, |(_, b)| sim > b) {
                best = Some((ins_idx, sim));
            }
        }

        if let Some((ins_idx, sim)) = best {
            let Some(target) = pairs[ins_idx].target.as_ref() else {
                continue;
            };
            let key = (source.hash.clone(), target.hash.clone());
            if existing.insert(key) {
                consumed.insert(ins_idx);
                replacements.push((del_idx, ins_idx, sim));
            }
        }
    }

    if replacements.is_empty() {
        return pairs;
    }

    tracing::debug!("Reclassified {} deletion/insertion pairs as moves", replacements.len());

    let mut slots: Vec<Option<AlignedPair>> = pairs.into_iter().map(Some).collect();
    for (del_idx, ins_idx, sim) in replacements {
        let source = slots[del_idx].take().and_then(|p| p.source);
        let target = slots[ins_idx].take().and_then(|p| p.target);
        if let (Some(source), Some(target)) = (source, target) {
            slots[del_idx] = Some(AlignedPair::paired(
                PairKind::Modification,
                source,
                target,
                sim,
            ));
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::segment::{segment, SegmentOptions};

    fn units(text: &str) -> Vec<SemanticUnit> {
        segment(text, &SegmentOptions::default()).units
    }

    fn unit_list(contents: &[&str]) -> Vec<SemanticUnit> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| SemanticUnit::new(c, i))
            .collect()
    }

    fn kinds(alignment: &Alignment) -> Vec<PairKind> {
        alignment.pairs.iter().map(|p| p.kind).collect()
    }

    fn options(strategy: AlignStrategy) -> AlignOptions {
        AlignOptions {
            strategy,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_sides() {
        let provider = TrigramProvider::new(64);
        let both = align(&[], &[], &AlignOptions::default(), Some(&provider))
            .await
            .unwrap();
        assert!(both.pairs.is_empty());

        let target = units("One. Two.");
        let inserted = align(&[], &target, &AlignOptions::default(), Some(&provider))
            .await
            .unwrap();
        assert_eq!(kinds(&inserted), vec![PairKind::Insertion, PairKind::Insertion]);
        assert_eq!(inserted.unmatched_target.len(), 2);
        assert!(inserted.pairs.iter().all(|p| p.similarity == 0.0));
    }

    #[tokio::test]
    async fn test_identical_sequences_match() {
        let provider = TrigramProvider::new(128);
        let a = units("Alpha goes first. Beta follows. Gamma ends it.");
        for strategy in [AlignStrategy::Sequential, AlignStrategy::Semantic, AlignStrategy::Hybrid] {
            let alignment = align(&a, &a, &options(strategy), Some(&provider)).await.unwrap();
            assert_eq!(kinds(&alignment), vec![PairKind::Match; 3]);
            assert!(alignment.pairs.iter().all(AlignedPair::is_unchanged));
        }
    }

    #[tokio::test]
    async fn test_sequential_insertion_and_deletion() {
        let provider = TrigramProvider::new(128);
        let a = unit_list(&["Alpha goes first.", "Beta follows.", "Gamma ends it."]);
        let b = unit_list(&["Alpha goes first.", "Gamma ends it.", "Delta joins late."]);

        let alignment = align(&a, &b, &options(AlignStrategy::Sequential), Some(&provider))
            .await
            .unwrap();
        assert_eq!(
            kinds(&alignment),
            vec![PairKind::Match, PairKind::Deletion, PairKind::Match, PairKind::Insertion]
        );
        assert_eq!(alignment.unmatched_source[0].content, "Beta follows.");
        assert_eq!(alignment.unmatched_target[0].content, "Delta joins late.");
    }

    #[tokio::test]
    async fn test_sequential_pairs_similar_content() {
        let provider = TrigramProvider::new(256);
        let a = unit_list(&["Install the package with cargo before running tests."]);
        let b = unit_list(&["Install the package using cargo before running tests."]);

        let alignment = align(&a, &b, &options(AlignStrategy::Sequential), Some(&provider))
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 1);
        assert!(alignment.pairs[0].source.is_some() && alignment.pairs[0].target.is_some());
        assert!(!alignment.pairs[0].is_unchanged());
    }

    #[tokio::test]
    async fn test_hash_identity_short_circuits_vectors() {
        // char-frequency vectors are zero for these, but hashes agree
        let provider = crate::embeddings::providers::charfreq::CharFrequencyProvider::new();
        let a = unit_list(&["123."]);
        let b = unit_list(&["123!"]);
        let alignment = align(&a, &b, &options(AlignStrategy::Sequential), Some(&provider))
            .await
            .unwrap();
        assert_eq!(kinds(&alignment), vec![PairKind::Match]);
        assert_eq!(alignment.pairs[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_semantic_handles_reordering() {
        let provider = TrigramProvider::new(256);
        let a = unit_list(&["Alpha goes first.", "Beta follows.", "Gamma ends it."]);
        let b = unit_list(&["Gamma ends it.", "Alpha goes first.", "Beta follows."]);

        let alignment = align(&a, &b, &options(AlignStrategy::Semantic), Some(&provider))
            .await
            .unwrap();
        assert_eq!(kinds(&alignment), vec![PairKind::Match; 3]);
        let targets: Vec<_> = alignment
            .pairs
            .iter()
            .map(|p| p.target.as_ref().unwrap().content.as_str())
            .collect();
        assert_eq!(targets, vec!["Gamma ends it.", "Alpha goes first.", "Beta follows."]);
    }

    #[tokio::test]
    async fn test_hybrid_reclassifies_moves() {
        let provider = TrigramProvider::new(256);
        let a = unit_list(&["Moving sentence here.", "Alpha goes first.", "Beta follows."]);
        let b = unit_list(&["Alpha goes first.", "Beta follows.", "Moving sentence here."]);

        let sequential = align(&a, &b, &options(AlignStrategy::Sequential), Some(&provider))
            .await
            .unwrap();
        assert_eq!(sequential.unmatched_source.len(), 1);
        assert_eq!(sequential.unmatched_target.len(), 1);

        let hybrid = align(&a, &b, &options(AlignStrategy::Hybrid), Some(&provider))
            .await
            .unwrap();
        assert_eq!(
            kinds(&hybrid),
            vec![PairKind::Modification, PairKind::Match, PairKind::Match]
        );
        assert!(hybrid.unmatched_source.is_empty());
        assert!(hybrid.unmatched_target.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_keeps_duplicate_sentences() {
        let provider = TrigramProvider::new(128);
        let a = unit_list(&["Yes.", "Alpha goes first.", "Yes."]);
        let alignment = align(&a, &a, &AlignOptions::default(), Some(&provider))
            .await
            .unwrap();
        assert_eq!(alignment.pairs.len(), 3);
        assert!(alignment.pairs.iter().all(AlignedPair::is_unchanged));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_propagates() {
        #[derive(Debug)]
        struct BrokenProvider;

        #[async_trait::async_trait]
        impl EmbeddingProvider for BrokenProvider {
            fn provider_name(&self) -> &str {
                "broken"
            }
            fn model_name(&self) -> &str {
                "broken"
            }
            fn dimensions(&self) -> usize {
                2
            }
            async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
                Ok(texts
                    .iter()
                    .enumerate()
                    .map(|(i, _)| vec![1.0; i + 1])
                    .collect())
            }
        }

        let a = unit_list(&["Alpha."]);
        let b = unit_list(&["Beta."]);
        let result = align(&a, &b, &AlignOptions::default(), Some(&BrokenProvider)).await;
        assert!(matches!(result, Err(AppError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_diagonal_below_threshold_is_modification() {
        assert_eq!(paired_kind(0.9, 0.75), PairKind::Match);
        assert_eq!(paired_kind(0.75, 0.75), PairKind::Match);
        assert_eq!(paired_kind(0.6, 0.75), PairKind::Modification);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("semantic".parse::<AlignStrategy>().unwrap(), AlignStrategy::Semantic);
        assert!("nearest".parse::<AlignStrategy>().is_err());
    }
}
