use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod retry;

pub use retry::{RetryError, RetryPolicy};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Sieve with variants covering all pipeline stages.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("splitter error: {0}")]
    Splitter(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("model error: {0}")]
    Model(String),
}

/// A query that could not be scored after all retry attempts.
#[derive(Debug)]
pub struct QueryFailure {
    pub query: String,
    pub attempts: usize,
    pub error: SieveError,
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query {:?} failed after {} attempt(s): {}",
            self.query, self.attempts, self.error
        )
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Record identifier as found in source files: either an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{i}"),
            RecordId::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A corpus document. Immutable once loaded; referenced by id everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One entry of a corpus file: `{"id": .., "text": ..}` or `[id, text]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorpusEntry {
    Object { id: RecordId, text: String },
    Pair(RecordId, String),
}

impl From<CorpusEntry> for Document {
    fn from(entry: CorpusEntry) -> Self {
        match entry {
            CorpusEntry::Object { id, text } | CorpusEntry::Pair(id, text) => {
                Document::new(id.to_string(), text)
            }
        }
    }
}

/// Parse a corpus from a JSON array. A document's position is its `doc_index`.
pub fn parse_corpus(json: &str) -> Result<Vec<Document>, SieveError> {
    let entries: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| SieveError::Parsing(format!("corpus is not a JSON array: {e}")))?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value::<CorpusEntry>(value)
                .map(Document::from)
                .map_err(|e| SieveError::Validation(format!("corpus entry {i}: {e}")))
        })
        .collect()
}

/// Load a corpus file from disk.
pub async fn load_corpus(path: impl AsRef<std::path::Path>) -> Result<Vec<Document>, SieveError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SieveError::Io(format!("cannot read {}: {e}", path.display())))?;
    let docs = parse_corpus(&json)?;
    tracing::info!(path = %path.display(), documents = docs.len(), "corpus loaded");
    Ok(docs)
}

/// The loaded document collection, addressable by position and by id.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    docs: Vec<Document>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    /// Build a corpus. Duplicate ids are rejected since every later stage keys by id.
    pub fn new(docs: Vec<Document>) -> Result<Self, SieveError> {
        let mut by_id = HashMap::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            if let Some(prev) = by_id.insert(doc.id.clone(), i) {
                return Err(SieveError::Validation(format!(
                    "duplicate document id {:?} at positions {prev} and {i}",
                    doc.id
                )));
            }
        }
        Ok(Self { docs, by_id })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn get(&self, doc_index: usize) -> Option<&Document> {
        self.docs.get(doc_index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Document> {
        self.by_id.get(id).map(|&i| &self.docs[i])
    }
}

// ---------------------------------------------------------------------------
// Retrieval records
// ---------------------------------------------------------------------------

/// A document hit from the sparse stage, as stored in the match cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_index: usize,
    pub bm25_score: f64,
}

/// The sparse-stage shortlist for one query, sorted by descending score.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub query: String,
    pub candidates: Vec<ScoredDoc>,
}

impl MatchRecord {
    pub fn doc_indices(&self) -> Vec<usize> {
        self.candidates.iter().map(|c| c.doc_index).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.bm25_score).collect()
    }
}

/// Dense-stage evidence for one candidate, sorted by descending similarity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub sentences: Vec<String>,
    pub scores: Vec<f32>,
}

impl EvidenceResult {
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }
}

// ---------------------------------------------------------------------------
// Examples
// ---------------------------------------------------------------------------

/// An entity or property reference carrying its surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    pub text: String,
}

/// Which side of the relation the answer entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropDir {
    Subj,
    Obj,
}

/// A single relational constraint of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub prop: Named,
    pub other_ent: Named,
    pub prop_dir: PropDir,
    pub truthy: bool,
}

/// A gold supporting passage attached to a candidate by annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldEvidence {
    pub text: String,
}

/// One member of the complete gold answer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub uri: String,
    pub text: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

/// A candidate answer entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub uri: String,
    pub text: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub desc: Option<String>,
    /// Gold label; absent in unlabeled splits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_answer: Option<bool>,
    #[serde(default)]
    pub evidence: Vec<GoldEvidence>,
    /// Dense-stage evidence, attached after retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved: Option<EvidenceResult>,
}

impl Candidate {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            aliases: Vec::new(),
            desc: None,
            is_answer: None,
            evidence: Vec::new(),
            retrieved: None,
        }
    }

    pub fn with_answer(mut self, is_answer: bool) -> Self {
        self.is_answer = Some(is_answer);
        self
    }
}

/// A question with its candidates and gold answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub id: RecordId,
    pub cluster_id: RecordId,
    pub question: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub complete_answer: Vec<Answer>,
    /// Question-level dense evidence (open retrieval mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved: Option<EvidenceResult>,
}

impl Example {
    /// Texts of candidates annotated as answers.
    pub fn gold_answers(&self) -> HashSet<String> {
        self.candidates
            .iter()
            .filter(|c| c.is_answer.unwrap_or(false))
            .map(|c| c.text.clone())
            .collect()
    }

    /// Texts of the complete gold answer set.
    pub fn complete_answers(&self) -> HashSet<String> {
        self.complete_answer.iter().map(|a| a.text.clone()).collect()
    }
}

/// Parse a JSON array of examples, naming the offending record on failure.
pub fn parse_examples(json: &str) -> Result<Vec<Example>, SieveError> {
    let records: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| SieveError::Parsing(format!("examples are not a JSON array: {e}")))?;
    records
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let id = value
                .get("id")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<missing>".to_string());
            serde_json::from_value::<Example>(value)
                .map_err(|e| SieveError::Validation(format!("example #{i} (id {id}): {e}")))
        })
        .collect()
}

/// Load an examples file from disk.
pub async fn load_examples(path: impl AsRef<std::path::Path>) -> Result<Vec<Example>, SieveError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SieveError::Io(format!("cannot read {}: {e}", path.display())))?;
    parse_examples(&json).map_err(|e| match e {
        SieveError::Validation(msg) => {
            SieveError::Validation(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Write examples back out, e.g. after evidence has been attached.
pub async fn save_examples(
    path: impl AsRef<std::path::Path>,
    examples: &[Example],
) -> Result<(), SieveError> {
    let path = path.as_ref();
    let json = serde_json::to_string(examples)
        .map_err(|e| SieveError::Parsing(format!("failed to serialize examples: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SieveError::Io(format!("failed to create directory: {e}")))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// Predicted answers per example id, each list ordered by confidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predictions(BTreeMap<String, Vec<String>>);

impl Predictions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the answers for an example, dropping repeats after their first
    /// occurrence.
    pub fn insert(&mut self, example_id: impl ToString, answers: Vec<String>) {
        self.0.insert(example_id.to_string(), dedup_ordered(answers));
    }

    pub fn get(&self, example_id: &str) -> Option<&[String]> {
        self.0.get(example_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Parse a `{example_id: [answer, ...]}` object.
    pub fn parse(json: &str) -> Result<Self, SieveError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| SieveError::Parsing(format!("malformed prediction file: {e}")))?;
        Ok(Self(
            raw.into_iter()
                .map(|(id, answers)| (id, dedup_ordered(answers)))
                .collect(),
        ))
    }

    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SieveError::Io(format!("cannot read {}: {e}", path.display())))?;
        let predictions = Self::parse(&json)?;
        tracing::info!(path = %path.display(), examples = predictions.len(), "predictions loaded");
        Ok(predictions)
    }

    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), SieveError> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)
            .map_err(|e| SieveError::Parsing(format!("failed to serialize predictions: {e}")))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", path.display())))
    }
}

impl FromIterator<(String, Vec<String>)> for Predictions {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut predictions = Self::new();
        for (id, answers) in iter {
            predictions.insert(id, answers);
        }
        predictions
    }
}

/// Keep the first occurrence of each string, preserving order.
pub fn dedup_ordered(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Embeddings trait (implemented in sieve-embeddings)
// ---------------------------------------------------------------------------

/// Trait for embedding text into vectors.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch passage embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SieveError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SieveError>;
}
