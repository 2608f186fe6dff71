//! Sieve: two-stage evidence retrieval (BM25 shortlist, dense re-rank) and
//! cluster-robust set evaluation.
//!
//! This crate re-exports the Sieve sub-crates for single-import usage.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `retrieval`, `eval` |
//! | `retrieval` | BM25 index, worker pool, match cache, dense re-ranker (pulls `splitters`, `embeddings`) |
//! | `splitters` | Sentence splitter and persisted sentence cache |
//! | `embeddings` | Fake, HTTP and cache-backed embedding providers |
//! | `context` | Context strategies and prediction assembly |
//! | `eval` | Set-F1, accuracy, cluster-robust and truncated evaluation |
//! | `full` | Everything |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sieve::core::{Corpus, load_corpus};
//! use sieve::retrieval::{Bm25Index, PoolConfig, WorkerPool};
//! use sieve::eval::evaluate_files;
//! ```

/// Core types: Document, Example, MatchRecord, EvidenceResult, Predictions, SieveError, RetryPolicy.
/// Always available.
pub use sieve_core as core;

/// Sparse and dense retrieval: tokenizer, BM25, worker pool, match cache, re-ranker.
#[cfg(feature = "retrieval")]
pub use sieve_retrieval as retrieval;

/// Sentence splitting and the sentence cache.
#[cfg(feature = "splitters")]
pub use sieve_splitters as splitters;

/// Embeddings: trait, HTTP provider, LRU sentence cache, cosine similarity.
#[cfg(feature = "embeddings")]
pub use sieve_embeddings as embeddings;

/// Context-construction strategies and external answer-model seams.
#[cfg(feature = "context")]
pub use sieve_context as context;

/// Evaluation: Metric trait, SetF1, Accuracy, evaluate, evaluate_files.
#[cfg(feature = "eval")]
pub use sieve_eval as eval;
