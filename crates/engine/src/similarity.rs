//! Vector and string similarity measures.

use serde::{Deserialize, Serialize};
use textmerge_core::{AppError, AppResult};

/// Scores at or above this are treated as identical.
pub const IDENTICAL_THRESHOLD: f32 = 0.9999;

/// Similarity classes, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimilarityClass {
    Identical,
    Equivalent,
    Similar,
    Different,
}

/// Cut-offs used by [`classify_similarity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityThresholds {
    pub equivalent_threshold: f32,
    pub similar_threshold: f32,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            equivalent_threshold: 0.95,
            similar_threshold: 0.80,
        }
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm. Vectors of different length
/// indicate a provider bug and fail with `AppError::DimensionMismatch`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(AppError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (norm_a * norm_b))
}

/// Levenshtein edit distance in chars.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row dynamic program
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / max_len`, with 1.0 for two empty strings.
pub fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f32 / max_len as f32
}

/// Bucket a similarity score.
pub fn classify_similarity(score: f32, thresholds: &SimilarityThresholds) -> SimilarityClass {
    if score >= IDENTICAL_THRESHOLD {
        SimilarityClass::Identical
    } else if score >= thresholds.equivalent_threshold {
        SimilarityClass::Equivalent
    } else if score >= thresholds.similar_threshold {
        SimilarityClass::Similar
    } else {
        SimilarityClass::Different
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&c, &d).unwrap().abs() < 0.001);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero_not_nan() {
        let zero = vec![0.0; 4];
        let other = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &other).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let result = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_similarity("", ""), 1.0);
        assert_eq!(levenshtein_similarity("abc", "abc"), 1.0);
        assert!((levenshtein_similarity("abcd", "abce") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_classify_similarity() {
        let t = SimilarityThresholds::default();
        assert_eq!(classify_similarity(1.0, &t), SimilarityClass::Identical);
        assert_eq!(classify_similarity(0.96, &t), SimilarityClass::Equivalent);
        assert_eq!(classify_similarity(0.85, &t), SimilarityClass::Similar);
        assert_eq!(classify_similarity(0.2, &t), SimilarityClass::Different);
    }
}
