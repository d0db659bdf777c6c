//! Character-frequency embedding provider.
//!
//! A 26-dimensional letter histogram. Needs no model and no network, so it
//! backs `--no-ml` runs.

use crate::embeddings::provider::EmbeddingProvider;
use textmerge_core::AppResult;

pub const CHAR_FREQUENCY_DIMENSIONS: usize = 26;

#[derive(Debug, Default)]
pub struct CharFrequencyProvider;

impl CharFrequencyProvider {
    pub fn new() -> Self {
        Self
    }

    fn letter_histogram(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; CHAR_FREQUENCY_DIMENSIONS];
        for c in text.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_lowercase() {
                counts[(c as u8 - b'a') as usize] += 1.0;
            }
        }

        let norm: f32 = counts.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut counts {
                *v /= norm;
            }
        }
        counts
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CharFrequencyProvider {
    fn provider_name(&self) -> &str {
        "char-frequency"
    }

    fn model_name(&self) -> &str {
        "char-frequency-v1"
    }

    fn dimensions(&self) -> usize {
        CHAR_FREQUENCY_DIMENSIONS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::letter_histogram(t)).collect())
    }
}
