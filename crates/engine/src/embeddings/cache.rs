//! Memoizing wrapper around an embedding provider.

use crate::embeddings::EmbeddingProvider;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use textmerge_core::{AppError, AppResult};

#[derive(Debug, Default)]
struct CacheState {
    vectors: HashMap<String, Vec<f32>>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

/// Caches embeddings by exact text. When full, the oldest entry is evicted.
#[derive(Debug)]
pub struct CachedProvider {
    inner: Arc<dyn EmbeddingProvider>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Number of cached embeddings.
    pub fn len(&self) -> usize {
        self.lock().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Entries are inserted whole, so a poisoned map is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, state: &mut CacheState, text: String, vector: Vec<f32>) {
        if state.vectors.contains_key(&text) {
            return;
        }
        while state.vectors.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.vectors.remove(&oldest);
                }
                None => break,
            }
        }
        state.order.push_back(text.clone());
        state.vectors.insert(text, vector);
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CachedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let missing: Vec<String> = {
            let state = self.lock();
            let mut seen = HashSet::new();
            texts
                .iter()
                .filter(|t| !state.vectors.contains_key(*t) && seen.insert(t.as_str()))
                .cloned()
                .collect()
        };

        let mut fetched: HashMap<String, Vec<f32>> = HashMap::new();
        if !missing.is_empty() {
            tracing::debug!(
                "Embedding cache miss for {} of {} texts",
                missing.len(),
                texts.len()
            );

            let vectors = self.inner.embed_batch(&missing).await?;
            if vectors.len() != missing.len() {
                return Err(AppError::Embedding(format!(
                    "Provider '{}' returned {} embeddings for {} texts",
                    self.inner.provider_name(),
                    vectors.len(),
                    missing.len()
                )));
            }
            fetched = missing.into_iter().zip(vectors).collect();
        }

        let mut state = self.lock();
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let vector = match fetched.get(text) {
                Some(v) => v.clone(),
                None => state.vectors.get(text).cloned().ok_or_else(|| {
                    AppError::Embedding(format!("Embedding for '{}' was evicted", text))
                })?,
            };
            results.push(vector);
        }

        for (text, vector) in fetched {
            self.insert(&mut state, text, vector);
        }

        Ok(results)
    }
}
