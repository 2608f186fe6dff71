mod attach;
mod bm25;
mod dense;
mod match_cache;
mod pool;
mod tokenize;

pub use attach::{attach_evidence, collect_queries, AttachReport, QuerySets, RetrievalMode};
pub use bm25::{top_k, top_k_scores, Bm25Index, Bm25Params, Idf};
pub use dense::{DenseReranker, RerankConfig};
pub use match_cache::{
    decode_match_line, encode_match_line, read_match_cache, write_match_cache, MatchCacheWriter,
    Shortlist,
};
pub use pool::{MatchStream, PoolConfig, PoolReport, QueryScorer, WorkerPool};
pub use tokenize::{is_stop_word, tokenize, STOP_WORDS};

// Re-export the records this crate produces for convenience
pub use sieve_core::{Corpus, Document, EvidenceResult, MatchRecord, ScoredDoc};
