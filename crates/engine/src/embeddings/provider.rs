//! Embedding provider trait and factory.

use crate::embeddings::cache::CachedProvider;
use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{
    charfreq::CharFrequencyProvider, ollama::OllamaProvider, trigram::TrigramProvider,
};
use std::sync::Arc;
use textmerge_core::{AppError, AppResult};

/// Trait for embedding providers.
///
/// Implementations return one vector per input text, in input order, all of
/// length [`dimensions`](EmbeddingProvider::dimensions).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "char-frequency", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// Providers are wrapped in a [`CachedProvider`] unless `cache_capacity` is 0.
pub async fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Config(
            "Embedding dimensions must be greater than 0".to_string(),
        ));
    }

    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "trigram" => Arc::new(TrigramProvider::new(config.dimensions)),

        "char-frequency" => Arc::new(CharFrequencyProvider::new()),

        "ollama" => Arc::new(OllamaProvider::new(config.clone()).await?),

        _ => {
            return Err(AppError::Embedding(format!(
                "Unknown embedding provider: '{}'. Supported providers: trigram, char-frequency, ollama",
                config.provider
            )))
        }
    };

    tracing::debug!(
        "Created embedding provider: provider={}, model={}, dimensions={}",
        provider.provider_name(),
        provider.model_name(),
        provider.dimensions()
    );

    if config.cache_capacity == 0 {
        return Ok(provider);
    }

    Ok(Arc::new(CachedProvider::new(provider, config.cache_capacity)))
}
