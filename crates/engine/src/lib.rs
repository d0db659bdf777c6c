//! Three-way merge engine for natural-language text.
//!
//! Documents are split into semantic units (sentences, paragraphs or
//! sections), aligned by embedding similarity and merged unit by unit,
//! dropping to word level where both sides touched the same sentence.
//! Diffs and patches are built on the same segmentation and alignment.

pub mod align;
pub mod diff;
pub mod embeddings;
pub mod hash;
pub mod merge;
pub mod patch;
pub mod segment;
pub mod similarity;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use align::{align, AlignOptions, AlignStrategy, AlignedPair, Alignment, PairKind};
pub use diff::{diff, word_diff, DiffGranularity, DiffOptions, DiffResult, Edit, EditOp};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use hash::{content_hash, create_hash, normalize};
pub use merge::{
    apply_resolver, merge, word_merge_3way, Conflict, ConflictResolver, ConflictStrategy,
    MergeOptions, MergeResult, MergeStats, Resolution, ResolutionSource, WordMergeResult,
};
pub use patch::{
    apply_patch, create_patch, deserialize_patch, is_compatible, serialize_patch, ApplyOptions,
    ApplyResult, Patch,
};
pub use segment::{reconstruct, segment, Granularity, SegmentOptions, SemanticUnit, UnitKind};
pub use similarity::{cosine_similarity, levenshtein_similarity};
