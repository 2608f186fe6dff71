use sieve_core::{Corpus, Document, MatchRecord, ScoredDoc, SieveError};
use sieve_retrieval::{read_match_cache, write_match_cache, MatchCacheWriter, Shortlist};

fn record(query: &str, hits: &[(usize, f64)]) -> MatchRecord {
    MatchRecord {
        query: query.to_string(),
        candidates: hits
            .iter()
            .map(|&(doc_index, bm25_score)| ScoredDoc {
                doc_index,
                bm25_score,
            })
            .collect(),
    }
}

fn corpus() -> Corpus {
    Corpus::new(vec![
        Document::new("Q90", "Paris is the capital of France."),
        Document::new("Q84", "London is the capital of England."),
        Document::new("Q64", "Berlin is the capital of Germany."),
    ])
    .unwrap()
}

#[tokio::test]
async fn written_cache_reads_back_in_order() -> Result<(), SieveError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bm25_docs_by_entity.jsonl");
    let records = vec![record("Paris", &[(0, 2.5), (2, 0.3)]), record("London", &[(1, 1.0)])];

    let written = write_match_cache(&path, &records).await?;
    assert_eq!(written, 2);
    assert_eq!(read_match_cache(&path).await?, records);
    Ok(())
}

#[tokio::test]
async fn writer_counts_lines() -> Result<(), SieveError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.jsonl");
    let mut writer = MatchCacheWriter::create(&path).await?;
    writer.write(&record("a", &[])).await?;
    writer.write(&record("b", &[(0, 0.0)])).await?;
    assert_eq!(writer.written(), 2);
    assert_eq!(writer.finish().await?, 2);

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(text.lines().count(), 2);
    Ok(())
}

#[tokio::test]
async fn malformed_line_names_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.jsonl");
    tokio::fs::write(
        &path,
        "[\"ok\", []]\n\n{\"query\": \"not a pair\"}\n",
    )
    .await
    .unwrap();

    let err = read_match_cache(&path).await.unwrap_err();
    assert!(matches!(err, SieveError::Cache(_)));
    assert!(err.to_string().contains(":3:"));
}

#[test]
fn shortlist_resolves_doc_indices_to_ids() -> Result<(), SieveError> {
    let shortlist = Shortlist::from_matches(
        vec![record("capital", &[(2, 3.0), (0, 1.0)])],
        &corpus(),
    )?;
    assert_eq!(shortlist.docs_for("capital"), ["Q64", "Q90"]);
    assert!(shortlist.contains("capital"));
    assert_eq!(shortlist.len(), 1);
    Ok(())
}

#[test]
fn out_of_range_doc_index_is_a_cache_error() {
    let err = Shortlist::from_matches(vec![record("x", &[(7, 1.0)])], &corpus()).unwrap_err();
    assert!(matches!(err, SieveError::Cache(_)));
    assert!(err.to_string().contains("doc_index 7"));
}
