use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use sieve_core::SieveError;

use crate::Embeddings;

/// Default number of sentence vectors kept per cache.
pub const DEFAULT_SENTENCE_CACHE_CAPACITY: usize = 100_000;

/// Bounded sentence-vector cache in front of a passage encoder.
///
/// Keys are exact sentence texts. When the cache is full the least recently
/// used sentence is evicted, so memory stays proportional to `capacity` no
/// matter how many shortlisted documents a run touches.
pub struct SentenceEmbeddingCache {
    encoder: Arc<dyn Embeddings>,
    capacity: usize,
    vectors: Arc<Mutex<LruCache<String, Vec<f32>>>>,
}

impl SentenceEmbeddingCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(encoder: Arc<dyn Embeddings>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            encoder,
            capacity,
            vectors: Arc::new(Mutex::new(LruCache::new(bound))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sentences currently held.
    pub fn len(&self) -> usize {
        self.vectors.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, sentence: &str) -> bool {
        self.vectors
            .lock()
            .map(|v| v.contains(sentence))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Vec<f32>>>, SieveError> {
        self.vectors
            .lock()
            .map_err(|_| SieveError::Cache("sentence vector cache poisoned".to_string()))
    }
}

#[async_trait]
impl Embeddings for SentenceEmbeddingCache {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SieveError> {
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<&str> = Vec::new();
        {
            let mut cache = self.lock()?;
            for text in texts {
                let hit = cache.get(*text).cloned();
                if hit.is_none() && !missing.contains(text) {
                    missing.push(text);
                }
                vectors.push(hit);
            }
        }

        if !missing.is_empty() {
            let fresh = self.encoder.embed_documents(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(SieveError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    fresh.len(),
                    missing.len()
                )));
            }
            tracing::trace!(
                embedded = missing.len(),
                reused = texts.len() - missing.len(),
                "sentence cache filled"
            );

            // Fill this call's answer from `fresh` directly: a small cache may
            // evict a sentence before the batch is assembled.
            for (slot, text) in vectors.iter_mut().zip(texts) {
                if slot.is_none() {
                    if let Some(pos) = missing.iter().position(|m| m == text) {
                        *slot = Some(fresh[pos].clone());
                    }
                }
            }
            let mut cache = self.lock()?;
            for (text, vector) in missing.into_iter().zip(fresh) {
                cache.put(text.to_string(), vector);
            }
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| SieveError::Embedding(format!("no vector for sentence {i}")))
            })
            .collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SieveError> {
        let mut vectors = self.embed_documents(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| SieveError::Embedding("empty response".to_string()))
    }
}
