use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use sieve_core::{Corpus, Document, SieveError};
use tokio::sync::RwLock;

use crate::SentenceSplitter;

/// Memoized sentence splits keyed by document id.
///
/// Entries are write-once: a document is split at most once and its sentence
/// list is never mutated afterwards. The cache can be persisted to a JSON file
/// mapping document id to its ordered sentences. There is no staleness
/// detection; delete the file when the corpus changes.
pub struct SentenceCache {
    splitter: Arc<dyn SentenceSplitter>,
    entries: RwLock<HashMap<String, Arc<[String]>>>,
}

impl SentenceCache {
    /// Create an empty cache around the given splitter.
    pub fn new(splitter: Arc<dyn SentenceSplitter>) -> Self {
        Self {
            splitter,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Sentences of `doc`, splitting it on first access.
    pub async fn sentences(&self, doc: &Document) -> Arc<[String]> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&doc.id) {
                return cached.clone();
            }
        }

        let split: Arc<[String]> = self.splitter.split_document(doc).into();
        let mut entries = self.entries.write().await;
        // Another caller may have split the same document meanwhile; keep the first.
        entries.entry(doc.id.clone()).or_insert(split).clone()
    }

    /// Cached sentences for a document id, without splitting.
    pub async fn get(&self, doc_id: &str) -> Option<Arc<[String]>> {
        self.entries.read().await.get(doc_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Split every corpus document not yet cached.
    pub async fn warm(&self, corpus: Arc<Corpus>) -> Result<usize, SieveError> {
        let missing: Vec<usize> = {
            let entries = self.entries.read().await;
            corpus
                .documents()
                .iter()
                .enumerate()
                .filter(|(_, d)| !entries.contains_key(&d.id))
                .map(|(i, _)| i)
                .collect()
        };
        if missing.is_empty() {
            return Ok(0);
        }

        tracing::info!(documents = missing.len(), "splitting documents into sentences");
        let splitter = self.splitter.clone();
        let split = tokio::task::spawn_blocking(move || {
            missing
                .into_iter()
                .filter_map(|i| corpus.get(i))
                .map(|doc| (doc.id.clone(), Arc::<[String]>::from(splitter.split_document(doc))))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| SieveError::Splitter(format!("sentence splitting task failed: {e}")))?;

        let added = split.len();
        let mut entries = self.entries.write().await;
        for (id, sentences) in split {
            entries.entry(id).or_insert(sentences);
        }
        Ok(added)
    }

    /// Load a persisted cache. Content of the wrong shape is a fatal cache error.
    pub async fn load(
        path: impl AsRef<Path>,
        splitter: Arc<dyn SentenceSplitter>,
    ) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SieveError::Io(format!("cannot read {}: {e}", path.display())))?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&json).map_err(|e| {
            SieveError::Cache(format!(
                "sentence cache {} is malformed (delete it to regenerate): {e}",
                path.display()
            ))
        })?;
        tracing::info!(path = %path.display(), documents = raw.len(), "sentence cache loaded");
        Ok(Self {
            splitter,
            entries: RwLock::new(raw.into_iter().map(|(k, v)| (k, v.into())).collect()),
        })
    }

    /// Persist the cache with keys in sorted order.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SieveError> {
        let path = path.as_ref();
        let json = {
            let entries = self.entries.read().await;
            let sorted: BTreeMap<&str, &[String]> = entries
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_ref()))
                .collect();
            serde_json::to_string(&sorted)
                .map_err(|e| SieveError::Cache(format!("failed to serialize sentences: {e}")))?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SieveError::Io(format!("failed to create directory: {e}")))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", path.display())))
    }

    /// Load the cache from `path` if it exists, otherwise split the whole
    /// corpus and persist the result there.
    pub async fn load_or_build(
        path: impl AsRef<Path>,
        corpus: Arc<Corpus>,
        splitter: Arc<dyn SentenceSplitter>,
    ) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| SieveError::Io(format!("cannot check {}: {e}", path.display())))?;
        if exists {
            return Self::load(path, splitter).await;
        }
        let cache = Self::new(splitter);
        cache.warm(corpus).await?;
        cache.save(path).await?;
        tracing::info!(path = %path.display(), "sentence cache written");
        Ok(cache)
    }
}
