use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use futures::StreamExt;
use sieve_core::{EvidenceResult, Example, RecordId, SieveError};

use crate::DenseReranker;

/// Which queries a dense lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Every candidate is re-ranked against the shortlist of its own text.
    /// Evidence lands on each candidate.
    #[default]
    Closed,
    /// The question is the only candidate and is re-ranked against its own
    /// shortlist. Evidence lands on the example.
    Open,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RetrievalMode::Closed => "closed",
            RetrievalMode::Open => "open",
        })
    }
}

impl FromStr for RetrievalMode {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(RetrievalMode::Closed),
            "open" => Ok(RetrievalMode::Open),
            other => Err(SieveError::Config(format!(
                "unknown retrieval mode {other:?} (expected \"closed\" or \"open\")"
            ))),
        }
    }
}

/// Distinct sparse-stage queries of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySets {
    /// Candidate texts, sorted and deduplicated.
    pub entities: Vec<String>,
    /// Questions, sorted and deduplicated.
    pub questions: Vec<String>,
}

/// Collect entity and question queries across examples.
pub fn collect_queries<'a>(examples: impl IntoIterator<Item = &'a Example>) -> QuerySets {
    let mut entities = BTreeSet::new();
    let mut questions = BTreeSet::new();
    for ex in examples {
        questions.insert(ex.question.clone());
        for candidate in &ex.candidates {
            entities.insert(candidate.text.clone());
        }
    }
    QuerySets {
        entities: entities.into_iter().collect(),
        questions: questions.into_iter().collect(),
    }
}

/// Outcome of attaching evidence to a batch of examples.
#[derive(Debug, Default)]
pub struct AttachReport {
    /// Examples that received evidence.
    pub attached: usize,
    /// Examples left untouched because their lookup failed.
    pub failures: Vec<(RecordId, SieveError)>,
}

impl AttachReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn lookup_example(
    reranker: &DenseReranker,
    example: &Example,
    mode: RetrievalMode,
) -> Result<Vec<EvidenceResult>, SieveError> {
    match mode {
        RetrievalMode::Closed => {
            let texts: Vec<&str> = example.candidates.iter().map(|c| c.text.as_str()).collect();
            reranker.lookup(&texts, &example.question).await
        }
        RetrievalMode::Open => reranker
            .lookup(&[example.question.as_str()], &example.question)
            .await,
    }
}

/// Re-rank evidence for every example and attach it in place.
///
/// Only the `retrieved` fields are written; every other field is left as is.
/// An example whose lookup fails (after the re-ranker's retries) is recorded
/// in the report and skipped; the rest of the batch still completes.
pub async fn attach_evidence(
    reranker: &DenseReranker,
    examples: &mut [Example],
    mode: RetrievalMode,
) -> AttachReport {
    let concurrency = reranker.config().concurrency.max(1);
    let lookups: Vec<Result<Vec<EvidenceResult>, SieveError>> =
        futures::stream::iter(examples.iter().map(|ex| lookup_example(reranker, ex, mode)))
            .buffered(concurrency)
            .collect()
            .await;

    let mut report = AttachReport::default();
    for (example, lookup) in examples.iter_mut().zip(lookups) {
        match lookup {
            Ok(results) => {
                match mode {
                    RetrievalMode::Closed => {
                        for (candidate, evidence) in example.candidates.iter_mut().zip(results) {
                            candidate.retrieved = Some(evidence);
                        }
                    }
                    RetrievalMode::Open => {
                        example.retrieved = Some(results.into_iter().next().unwrap_or_default());
                    }
                }
                report.attached += 1;
            }
            Err(error) => {
                tracing::error!(example = %example.id, error = %error, "evidence lookup failed");
                report.failures.push((example.id.clone(), error));
            }
        }
    }

    tracing::info!(
        mode = %mode,
        attached = report.attached,
        failed = report.failures.len(),
        "evidence attached"
    );
    report
}
