//! Embedding provider configuration.

use serde::{Deserialize, Serialize};
use textmerge_core::config::EmbeddingSettings;

/// Configuration used to build an embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "char-frequency", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Number of memoized embeddings kept by the cache wrapper (0 disables it)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Base URL for HTTP providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 256,
            cache_capacity: 1000,
            endpoint: None,
        }
    }
}

impl From<&EmbeddingSettings> for EmbeddingConfig {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            cache_capacity: settings.cache_capacity,
            endpoint: settings.endpoint.clone(),
        }
    }
}

impl EmbeddingConfig {
    /// Configuration of the dependency-free fallback provider.
    pub fn char_frequency() -> Self {
        Self {
            provider: "char-frequency".to_string(),
            model: "char-frequency-v1".to_string(),
            dimensions: super::providers::charfreq::CHAR_FREQUENCY_DIMENSIONS,
            ..Self::default()
        }
    }
}
