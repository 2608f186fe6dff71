use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use sieve_core::{Document, MatchRecord, ScoredDoc, SieveError};

use crate::tokenize;

/// Inverse document frequency variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Idf {
    /// `ln((N - df + 0.5) / (df + 0.5))`. Negative values (terms in more than
    /// half the corpus) are replaced by `epsilon * mean_idf`.
    Okapi { epsilon: f64 },
    /// `ln((N - df + 0.5) / (df + 0.5) + 1)`, never negative.
    Plus,
}

impl Default for Idf {
    fn default() -> Self {
        Idf::Okapi { epsilon: 0.25 }
    }
}

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term saturation (default 1.5).
    pub k1: f64,
    /// Length normalization (default 0.75).
    pub b: f64,
    pub idf: Idf,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            idf: Idf::default(),
        }
    }
}

impl Bm25Params {
    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_b(mut self, b: f64) -> Self {
        self.b = b;
        self
    }

    pub fn with_idf(mut self, idf: Idf) -> Self {
        self.idf = idf;
        self
    }
}

/// In-memory BM25 statistics over a document collection.
///
/// Built once from the full corpus and immutable afterwards; adding documents
/// means building a new index. Documents are addressed by their position in
/// the input slice (`doc_index`).
#[derive(Debug, Clone)]
pub struct Bm25Index {
    /// Postings per term: (doc_index, term frequency), ascending by doc_index
    postings: HashMap<String, Vec<(u32, u32)>>,
    /// Precomputed idf per term
    idf: HashMap<String, f64>,
    /// Token count per document
    doc_lengths: Vec<u32>,
    avg_doc_length: f64,
    params: Bm25Params,
}

impl Bm25Index {
    /// Build an index with default parameters.
    pub fn build(documents: &[Document]) -> Self {
        Self::with_params(documents, Bm25Params::default())
    }

    pub fn with_params(documents: &[Document], params: Bm25Params) -> Self {
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (doc_index, doc) in documents.iter().enumerate() {
            let tokens = tokenize(&doc.text);
            let mut term_freq: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
            }
            for (term, tf) in term_freq {
                postings.entry(term).or_default().push((doc_index as u32, tf));
            }
            doc_lengths.push(tokens.len() as u32);
        }

        let avg_doc_length = if documents.is_empty() {
            0.0
        } else {
            doc_lengths.iter().map(|&l| l as f64).sum::<f64>() / documents.len() as f64
        };
        let idf = compute_idf(&postings, documents.len(), params.idf);

        tracing::debug!(
            documents = documents.len(),
            terms = postings.len(),
            avg_doc_length,
            "bm25 index built"
        );

        Self {
            postings,
            idf,
            doc_lengths,
            avg_doc_length,
            params,
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Number of documents containing `term` (already normalized).
    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// One BM25 score per document for a tokenized query.
    ///
    /// Each query token contributes separately, so a repeated token counts
    /// once per occurrence. Per-document accumulation follows query token
    /// order, which keeps scores independent of corpus order.
    pub fn score(&self, query_tokens: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.len()];
        let k1 = self.params.k1;
        let b = self.params.b;

        for token in query_tokens {
            let (Some(postings), Some(&idf)) = (self.postings.get(token), self.idf.get(token))
            else {
                continue;
            };
            for &(doc_index, tf) in postings {
                let tf = tf as f64;
                let doc_len = self.doc_lengths[doc_index as usize] as f64;
                let length_ratio = if self.avg_doc_length > 0.0 {
                    doc_len / self.avg_doc_length
                } else {
                    0.0
                };
                let denominator = tf + k1 * (1.0 - b + b * length_ratio);
                scores[doc_index as usize] += idf * (tf * (k1 + 1.0) / denominator);
            }
        }
        scores
    }

    /// Tokenize `query`, score every document, and keep the best `top_k`.
    pub fn search(&self, query: &str, top_k: usize) -> MatchRecord {
        let scores = self.score(&tokenize(query));
        MatchRecord {
            query: query.to_string(),
            candidates: top_k_scores(&scores, top_k),
        }
    }
}

fn compute_idf(
    postings: &HashMap<String, Vec<(u32, u32)>>,
    n_docs: usize,
    variant: Idf,
) -> HashMap<String, f64> {
    // Sorted so the mean below sums in a fixed order.
    let sorted: BTreeMap<&str, usize> = postings
        .iter()
        .map(|(term, p)| (term.as_str(), p.len()))
        .collect();
    let n = n_docs as f64;

    match variant {
        Idf::Plus => sorted
            .into_iter()
            .map(|(term, df)| {
                let df = df as f64;
                (term.to_string(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect(),
        Idf::Okapi { epsilon } => {
            let raw: Vec<(&str, f64)> = sorted
                .into_iter()
                .map(|(term, df)| {
                    let df = df as f64;
                    (term, (n - df + 0.5).ln() - (df + 0.5).ln())
                })
                .collect();
            let mean = if raw.is_empty() {
                0.0
            } else {
                raw.iter().map(|(_, v)| v).sum::<f64>() / raw.len() as f64
            };
            let floor = epsilon * mean;
            raw.into_iter()
                .map(|(term, v)| (term.to_string(), if v < 0.0 { floor } else { v }))
                .collect()
        }
    }
}

/// Descending by score, then ascending by doc_index. Total over all floats.
fn rank_order(scores: &[f64], a: usize, b: usize) -> Ordering {
    scores[b].total_cmp(&scores[a]).then(a.cmp(&b))
}

/// Select the `k` highest scores as ranked `(doc_index, score)` pairs.
///
/// Uses partial selection followed by a sort of the selected prefix,
/// O(n + k log k). Ties resolve on ascending doc_index so repeated runs are
/// bit-identical. Returns `min(k, scores.len())` entries.
pub fn top_k_scores(scores: &[f64], k: usize) -> Vec<ScoredDoc> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, |&a, &b| rank_order(scores, a, b));
        indices.truncate(k);
    }
    indices.sort_unstable_by(|&a, &b| rank_order(scores, a, b));

    indices
        .into_iter()
        .map(|doc_index| ScoredDoc {
            doc_index,
            bm25_score: scores[doc_index],
        })
        .collect()
}

/// [`top_k_scores`] that rejects NaN scores, which have no meaningful rank.
pub fn top_k(scores: &[f64], k: usize) -> Result<Vec<ScoredDoc>, SieveError> {
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(SieveError::Retrieval(format!(
            "score for document {i} is NaN"
        )));
    }
    Ok(top_k_scores(scores, k))
}
