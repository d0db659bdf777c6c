//! Embedding providers used by alignment.
//!
//! Provider-agnostic: alignment only sees the [`EmbeddingProvider`] trait.
//! A process-wide default provider serves callers that pass none; it is
//! meant to be configured once at startup, before any merge is in flight.

pub mod cache;
pub mod config;
pub mod provider;
pub mod providers;

pub use cache::CachedProvider;
pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use providers::trigram::TrigramProvider;
use std::sync::{Arc, PoisonError, RwLock};

/// Dimensions of the fallback provider used when no default is configured.
pub const DEFAULT_DIMENSIONS: usize = 256;

static DEFAULT_PROVIDER: RwLock<Option<Arc<dyn EmbeddingProvider>>> = RwLock::new(None);

/// Replace the process-wide default provider.
pub fn set_default_provider(provider: Arc<dyn EmbeddingProvider>) {
    tracing::debug!(
        "Default embedding provider set to {} ({})",
        provider.provider_name(),
        provider.model_name()
    );
    *DEFAULT_PROVIDER
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(provider);
}

/// The configured default provider, or a trigram provider when none is set.
pub fn default_provider() -> Arc<dyn EmbeddingProvider> {
    let configured = DEFAULT_PROVIDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    configured.unwrap_or_else(|| Arc::new(TrigramProvider::new(DEFAULT_DIMENSIONS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_provider_round_trip() {
        let before = default_provider();
        assert_eq!(before.provider_name(), "trigram");

        // Same shape as the fallback, so concurrent tests see no difference
        set_default_provider(Arc::new(TrigramProvider::new(DEFAULT_DIMENSIONS)));

        let provider = default_provider();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);
        let vector = provider.embed("default provider text").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_DIMENSIONS);
    }
}
