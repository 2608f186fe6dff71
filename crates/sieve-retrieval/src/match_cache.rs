use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sieve_core::{Corpus, MatchRecord, ScoredDoc, SieveError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Encode a match record as one cache line: `[query, [{doc_index, bm25_score}, ...]]`.
pub fn encode_match_line(record: &MatchRecord) -> Result<String, SieveError> {
    serde_json::to_string(&(&record.query, &record.candidates))
        .map_err(|e| SieveError::Cache(format!("failed to encode match record: {e}")))
}

/// Decode one cache line. Anything not shaped like a match record is a cache error.
pub fn decode_match_line(line: &str) -> Result<MatchRecord, SieveError> {
    let (query, candidates): (String, Vec<ScoredDoc>) = serde_json::from_str(line)
        .map_err(|e| SieveError::Cache(format!("malformed match line: {e}")))?;
    Ok(MatchRecord { query, candidates })
}

/// Appends match records to a JSON Lines cache file.
///
/// Single writer: the pool's output stream is drained into one writer so
/// lines never interleave.
pub struct MatchCacheWriter {
    path: PathBuf,
    writer: BufWriter<tokio::fs::File>,
    written: usize,
}

impl MatchCacheWriter {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SieveError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SieveError::Io(format!("failed to create directory: {e}")))?;
        }
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| SieveError::Io(format!("cannot create {}: {e}", path.display())))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub async fn write(&mut self, record: &MatchRecord) -> Result<(), SieveError> {
        let mut line = encode_match_line(record)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", self.path.display())))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered lines and return how many were written.
    pub async fn finish(mut self) -> Result<usize, SieveError> {
        self.writer
            .flush()
            .await
            .map_err(|e| SieveError::Io(format!("failed to flush {}: {e}", self.path.display())))?;
        Ok(self.written)
    }
}

/// Write a whole set of records to a match cache file.
pub async fn write_match_cache(
    path: impl AsRef<Path>,
    records: &[MatchRecord],
) -> Result<usize, SieveError> {
    let mut writer = MatchCacheWriter::create(path).await?;
    for record in records {
        writer.write(record).await?;
    }
    writer.finish().await
}

/// Read every record of a match cache file. Blank lines are skipped.
pub async fn read_match_cache(path: impl AsRef<Path>) -> Result<Vec<MatchRecord>, SieveError> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SieveError::Io(format!("cannot open {}: {e}", path.display())))?;
    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| SieveError::Io(format!("failed to read {}: {e}", path.display())))?
    {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = decode_match_line(&line).map_err(|e| {
            SieveError::Cache(format!("{}:{line_no}: {e}", path.display()))
        })?;
        records.push(record);
    }

    tracing::info!(path = %path.display(), queries = records.len(), "match cache loaded");
    Ok(records)
}

/// Query to shortlisted document ids, resolved from a match cache.
#[derive(Debug, Clone, Default)]
pub struct Shortlist {
    docs: HashMap<String, Vec<String>>,
}

impl Shortlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve each record's `doc_index` against the corpus, keeping score order.
    /// An index outside the corpus means the cache belongs to another corpus.
    pub fn from_matches(
        records: impl IntoIterator<Item = MatchRecord>,
        corpus: &Corpus,
    ) -> Result<Self, SieveError> {
        let mut docs = HashMap::new();
        for record in records {
            let ids = record
                .candidates
                .iter()
                .map(|hit| {
                    corpus
                        .get(hit.doc_index)
                        .map(|doc| doc.id.clone())
                        .ok_or_else(|| {
                            SieveError::Cache(format!(
                                "match for {:?} references doc_index {} but the corpus has {} documents",
                                record.query,
                                hit.doc_index,
                                corpus.len()
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            docs.insert(record.query, ids);
        }
        Ok(Self { docs })
    }

    pub fn insert(&mut self, query: impl Into<String>, doc_ids: Vec<String>) {
        self.docs.insert(query.into(), doc_ids);
    }

    /// Shortlisted document ids for `query`; empty when the query was never scored.
    pub fn docs_for(&self, query: &str) -> &[String] {
        self.docs.get(query).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, query: &str) -> bool {
        self.docs.contains_key(query)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_is_query_then_hits() {
        let record = MatchRecord {
            query: "Paris".into(),
            candidates: vec![ScoredDoc {
                doc_index: 3,
                bm25_score: 1.5,
            }],
        };
        let line = encode_match_line(&record).unwrap();
        assert_eq!(line, r#"["Paris",[{"doc_index":3,"bm25_score":1.5}]]"#);
        assert_eq!(decode_match_line(&line).unwrap(), record);
    }

    #[test]
    fn wrong_key_type_is_a_cache_error() {
        let err = decode_match_line(r#"[1, [{"doc_index": "x", "bm25_score": 1.0}]]"#).unwrap_err();
        assert!(matches!(err, SieveError::Cache(_)));
    }

    #[test]
    fn unknown_query_has_empty_shortlist() {
        assert!(Shortlist::new().docs_for("nobody").is_empty());
    }
}
