mod cache;
mod sentence;

pub use cache::SentenceCache;
pub use sentence::RuleSentenceSplitter;

// Re-export Document from core for convenience
pub use sieve_core::Document;

/// Trait for splitting document text into sentences.
pub trait SentenceSplitter: Send + Sync {
    /// Split text into sentences, in document order.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split a document's text.
    fn split_document(&self, doc: &Document) -> Vec<String> {
        self.split(&doc.text)
    }
}
