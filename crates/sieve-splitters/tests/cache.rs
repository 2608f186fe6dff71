use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sieve_core::{Corpus, Document, SieveError};
use sieve_splitters::{RuleSentenceSplitter, SentenceCache, SentenceSplitter};

/// Splitter that counts how often it is invoked.
struct CountingSplitter {
    calls: AtomicUsize,
}

impl SentenceSplitter for CountingSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RuleSentenceSplitter::new().split(text)
    }
}

fn corpus() -> Arc<Corpus> {
    Arc::new(
        Corpus::new(vec![
            Document::new("a", "Cats sit. Dogs run."),
            Document::new("b", "Birds fly."),
        ])
        .unwrap(),
    )
}

#[tokio::test]
async fn splits_each_document_once() {
    let splitter = Arc::new(CountingSplitter {
        calls: AtomicUsize::new(0),
    });
    let cache = SentenceCache::new(splitter.clone());
    let doc = Document::new("a", "Cats sit. Dogs run.");

    let first = cache.sentences(&doc).await;
    let second = cache.sentences(&doc).await;

    assert_eq!(&first[..], ["Cats sit.", "Dogs run."]);
    assert_eq!(first, second);
    assert_eq!(splitter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persisted_cache_skips_resplitting() -> Result<(), SieveError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sents.json");

    let built =
        SentenceCache::load_or_build(&path, corpus(), Arc::new(RuleSentenceSplitter::new()))
            .await?;
    assert_eq!(built.len().await, 2);
    assert!(path.exists());

    let splitter = Arc::new(CountingSplitter {
        calls: AtomicUsize::new(0),
    });
    let loaded = SentenceCache::load_or_build(&path, corpus(), splitter.clone()).await?;
    assert_eq!(
        loaded.get("a").await.as_deref(),
        Some(&["Cats sit.".to_string(), "Dogs run.".to_string()][..])
    );
    assert_eq!(splitter.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_cache_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sents.json");
    tokio::fs::write(&path, r#"{"a": "not a list"}"#).await.unwrap();

    let result = SentenceCache::load(&path, Arc::new(RuleSentenceSplitter::new())).await;
    assert!(matches!(result, Err(SieveError::Cache(_))));
}

#[tokio::test]
async fn warm_only_splits_missing_documents() -> Result<(), SieveError> {
    let cache = SentenceCache::new(Arc::new(RuleSentenceSplitter::new()));
    cache.sentences(&Document::new("a", "Cats sit. Dogs run.")).await;
    let added = cache.warm(corpus()).await?;
    assert_eq!(added, 1);
    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.warm(corpus()).await?, 0);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_cache_path_is_an_error_not_a_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sents.json");
    // A self-referencing symlink: checking it fails with ELOOP.
    std::os::unix::fs::symlink(&path, &path).unwrap();

    let splitter = Arc::new(CountingSplitter {
        calls: AtomicUsize::new(0),
    });
    let result = SentenceCache::load_or_build(&path, corpus(), splitter.clone()).await;

    assert!(matches!(result, Err(SieveError::Io(ref msg)) if msg.contains("cannot check")));
    assert_eq!(splitter.calls.load(Ordering::SeqCst), 0);
}
