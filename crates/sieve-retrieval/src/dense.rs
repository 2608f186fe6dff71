use std::sync::Arc;
use std::time::Duration;

use sieve_core::{Corpus, Embeddings, EvidenceResult, RetryPolicy, SieveError};
use sieve_embeddings::cosine_similarity;
use sieve_splitters::SentenceCache;

use crate::Shortlist;

/// Dense re-ranking configuration.
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Sentences kept per candidate (default 20).
    pub top_k: usize,
    /// Most texts sent to the passage encoder in one call (default 256).
    pub max_batch_size: usize,
    /// Sentences scoring below this are dropped (default none).
    pub min_score: Option<f32>,
    /// Examples re-ranked concurrently by `attach_evidence` (default 4).
    pub concurrency: usize,
    /// Time allowed for one embedding call (default 300s).
    pub task_timeout: Duration,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            max_batch_size: 256,
            min_score: None,
            concurrency: 4,
            task_timeout: Duration::from_secs(300),
        }
    }
}

impl RerankConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }
}

/// Selects the sentences of shortlisted documents most similar to a
/// candidate-conditioned query.
///
/// The query for a candidate is `"{candidate}. {question}"`, embedded with
/// the query encoder; sentences are embedded with the passage encoder. Both
/// may be the same provider.
pub struct DenseReranker {
    query_encoder: Arc<dyn Embeddings>,
    passage_encoder: Arc<dyn Embeddings>,
    corpus: Arc<Corpus>,
    sentences: Arc<SentenceCache>,
    shortlist: Arc<Shortlist>,
    config: RerankConfig,
    retry: RetryPolicy,
}

impl DenseReranker {
    pub fn new(
        encoder: Arc<dyn Embeddings>,
        corpus: Arc<Corpus>,
        sentences: Arc<SentenceCache>,
        shortlist: Arc<Shortlist>,
    ) -> Self {
        Self {
            query_encoder: encoder.clone(),
            passage_encoder: encoder,
            corpus,
            sentences,
            shortlist,
            config: RerankConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a separate encoder for candidate queries.
    pub fn with_query_encoder(mut self, encoder: Arc<dyn Embeddings>) -> Self {
        self.query_encoder = encoder;
        self
    }

    pub fn with_config(mut self, config: RerankConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy applied to each embedding call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Sentences of every document shortlisted for `key`, in shortlist then
    /// sentence order.
    async fn gather(&self, key: &str) -> Result<Vec<String>, SieveError> {
        let mut gathered = Vec::new();
        for doc_id in self.shortlist.docs_for(key) {
            let doc = self.corpus.get_by_id(doc_id).ok_or_else(|| {
                SieveError::Cache(format!(
                    "shortlist for {key:?} names unknown document {doc_id:?}"
                ))
            })?;
            let sentences = self.sentences.sentences(doc).await;
            gathered.extend(sentences.iter().cloned());
        }
        Ok(gathered)
    }

    /// One provider call under the retry policy, each attempt bounded by
    /// `task_timeout`.
    async fn embed(
        &self,
        encoder: &Arc<dyn Embeddings>,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, SieveError> {
        let timeout = self.config.task_timeout;
        let vectors = self
            .retry
            .run(|attempt| async move {
                match tokio::time::timeout(timeout, encoder.embed_documents(texts)).await {
                    Ok(result) => result,
                    Err(_) => Err(SieveError::Timeout(format!(
                        "embedding {} texts exceeded {timeout:?} on attempt {}",
                        texts.len(),
                        attempt + 1
                    ))),
                }
            })
            .await
            .map_err(|e| e.error)?;
        check_count(&vectors, texts.len())?;
        Ok(vectors)
    }

    async fn embed_queries(&self, queries: &[String]) -> Result<Vec<Vec<f32>>, SieveError> {
        let texts: Vec<&str> = queries.iter().map(String::as_str).collect();
        self.embed(&self.query_encoder, &texts).await
    }

    async fn embed_passages(&self, sentences: &[&str]) -> Result<Vec<Vec<f32>>, SieveError> {
        let mut vectors = Vec::with_capacity(sentences.len());
        for chunk in sentences.chunks(self.config.max_batch_size.max(1)) {
            vectors.extend(self.embed(&self.passage_encoder, chunk).await?);
        }
        Ok(vectors)
    }

    /// Rank evidence sentences for each candidate against `query`.
    ///
    /// Returns one result per candidate, in candidate order. A candidate with
    /// no shortlisted documents (or no sentences) gets an empty result.
    /// Shortlists are keyed by candidate text.
    pub async fn lookup(
        &self,
        candidates: &[&str],
        query: &str,
    ) -> Result<Vec<EvidenceResult>, SieveError> {
        let mut per_candidate = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            per_candidate.push(self.gather(candidate).await?);
        }

        let active: Vec<usize> = (0..candidates.len())
            .filter(|&i| !per_candidate[i].is_empty())
            .collect();
        let mut results = vec![EvidenceResult::default(); candidates.len()];
        if active.is_empty() {
            return Ok(results);
        }

        let queries: Vec<String> = active
            .iter()
            .map(|&i| format!("{}. {}", candidates[i], query))
            .collect();
        let query_vectors = self.embed_queries(&queries).await?;

        let flat: Vec<&str> = active
            .iter()
            .flat_map(|&i| per_candidate[i].iter().map(String::as_str))
            .collect();
        let sentence_vectors = self.embed_passages(&flat).await?;

        let mut offset = 0;
        for (query_vector, &i) in query_vectors.iter().zip(&active) {
            let count = per_candidate[i].len();
            let scores: Vec<f32> = sentence_vectors[offset..offset + count]
                .iter()
                .map(|v| cosine_similarity(query_vector, v))
                .collect();
            offset += count;
            results[i] = select_top(&per_candidate[i], &scores, &self.config);
        }

        tracing::debug!(
            candidates = candidates.len(),
            sentences = flat.len(),
            "dense re-rank complete"
        );
        Ok(results)
    }

    /// [`lookup`](Self::lookup) for a single candidate.
    pub async fn lookup_one(
        &self,
        candidate: &str,
        query: &str,
    ) -> Result<EvidenceResult, SieveError> {
        let mut results = self.lookup(&[candidate], query).await?;
        Ok(results.pop().unwrap_or_default())
    }
}

fn check_count(vectors: &[Vec<f32>], expected: usize) -> Result<(), SieveError> {
    if vectors.len() != expected {
        return Err(SieveError::Embedding(format!(
            "provider returned {} vectors for {expected} texts",
            vectors.len()
        )));
    }
    Ok(())
}

/// Highest-scoring sentences first; equal scores keep document order.
fn select_top(sentences: &[String], scores: &[f32], config: &RerankConfig) -> EvidenceResult {
    let mut order: Vec<usize> = (0..sentences.len())
        .filter(|&j| config.min_score.is_none_or(|floor| scores[j] >= floor))
        .collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(config.top_k);

    EvidenceResult {
        sentences: order.iter().map(|&j| sentences[j].clone()).collect(),
        scores: order.iter().map(|&j| scores[j]).collect(),
    }
}
