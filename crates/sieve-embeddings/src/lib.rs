mod cached;
mod http;
mod similarity;

pub use cached::{SentenceEmbeddingCache, DEFAULT_SENTENCE_CACHE_CAPACITY};
pub use http::{HttpEmbeddings, HttpEmbeddingsConfig};
pub use similarity::cosine_similarity;

// Re-export the Embeddings trait from core (forward-declared there).
pub use sieve_core::Embeddings;
