use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use sieve_core::{MatchRecord, QueryFailure, RetryPolicy, SieveError};
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::Bm25Index;

/// Something that turns one query into its top-k match record.
///
/// Scoring is synchronous and CPU bound; the pool runs it on the blocking
/// thread pool. Implementations are shared read-only across workers.
pub trait QueryScorer: Send + Sync + 'static {
    fn score_query(&self, query: &str, top_k: usize) -> Result<MatchRecord, SieveError>;
}

impl QueryScorer for Bm25Index {
    fn score_query(&self, query: &str, top_k: usize) -> Result<MatchRecord, SieveError> {
        Ok(self.search(query, top_k))
    }
}

/// Worker pool configuration.
#[derive(Debug)]
pub struct PoolConfig {
    /// Number of concurrent workers (default 24).
    pub workers: usize,
    /// Documents kept per query (default 5).
    pub top_k: usize,
    /// Pending-query buffer is `workers * buffer_factor` (default 10).
    pub buffer_factor: usize,
    /// Time allowed for one scoring attempt (default 1200s).
    pub task_timeout: Duration,
    /// Attempts per query before it is reported as failed.
    pub retry: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 24,
            top_k: 5,
            buffer_factor: 10,
            task_timeout: Duration::from_secs(1200),
            retry: RetryPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_buffer_factor(mut self, buffer_factor: usize) -> Self {
        self.buffer_factor = buffer_factor;
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn buffer_size(&self) -> usize {
        (self.workers.max(1) * self.buffer_factor).max(1)
    }
}

/// Output of [`WorkerPool::submit`]: one item per distinct query, in
/// completion order.
pub type MatchStream = Pin<Box<dyn Stream<Item = Result<MatchRecord, QueryFailure>> + Send>>;

/// Everything a finished pool run produced.
#[derive(Debug, Default)]
pub struct PoolReport {
    pub records: Vec<MatchRecord>,
    pub failures: Vec<QueryFailure>,
}

impl PoolReport {
    /// True when every query was scored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Records sorted by query, for order-independent comparison.
    pub fn sorted_records(&self) -> Vec<&MatchRecord> {
        let mut records: Vec<&MatchRecord> = self.records.iter().collect();
        records.sort_by(|a, b| a.query.cmp(&b.query));
        records
    }
}

/// Fixed-size pool of workers sharing one immutable scorer.
///
/// Queries flow through a bounded channel, so the feeder only runs ahead of
/// the workers by the configured buffer. Each distinct query is scored
/// exactly once; results come back in completion order.
pub struct WorkerPool<S: QueryScorer> {
    scorer: Arc<S>,
    config: Arc<PoolConfig>,
}

impl<S: QueryScorer> Clone for WorkerPool<S> {
    fn clone(&self) -> Self {
        Self {
            scorer: self.scorer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: QueryScorer> WorkerPool<S> {
    pub fn new(scorer: S, config: PoolConfig) -> Self {
        Self::from_shared(Arc::new(scorer), config)
    }

    pub fn from_shared(scorer: Arc<S>, config: PoolConfig) -> Self {
        Self {
            scorer,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Score every distinct query, streaming results as workers finish.
    ///
    /// Duplicates are dropped before scoring. A query that keeps failing or
    /// timing out is yielded as a [`QueryFailure`] and the rest continue.
    /// Workers start on first poll of the stream.
    pub fn submit<I>(&self, queries: I) -> MatchStream
    where
        I: IntoIterator<Item = String>,
    {
        let queries: BTreeSet<String> = queries.into_iter().collect();
        let scorer = self.scorer.clone();
        let config = self.config.clone();

        Box::pin(async_stream::stream! {
            let total = queries.len();
            let workers = config.workers.max(1).min(total.max(1));
            let (task_tx, task_rx) = mpsc::channel::<String>(config.buffer_size());
            let (result_tx, mut result_rx) = mpsc::channel(config.buffer_size());
            let task_rx = Arc::new(Mutex::new(task_rx));
            let scorer_slots = Arc::new(Semaphore::new(workers));

            tracing::info!(queries = total, workers, "bm25 search started");

            for worker in 0..workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let scorer = scorer.clone();
                let config = config.clone();
                let scorer_slots = scorer_slots.clone();
                tokio::spawn(async move {
                    loop {
                        let next = task_rx.lock().await.recv().await;
                        let Some(query) = next else { break };
                        let outcome =
                            score_with_retry(&scorer, &config, &scorer_slots, query).await;
                        if result_tx.send(outcome).await.is_err() {
                            break;
                        }
                    }
                    tracing::debug!(worker, "worker finished");
                });
            }
            drop(result_tx);
            drop(task_rx);

            tokio::spawn(async move {
                for query in queries {
                    if task_tx.send(query).await.is_err() {
                        break;
                    }
                }
            });

            let mut done = 0usize;
            while let Some(outcome) = result_rx.recv().await {
                done += 1;
                if let Err(failure) = &outcome {
                    tracing::error!(error = %failure, "query failed");
                }
                if done % 10_000 == 0 {
                    tracing::info!(done, total, "bm25 search progress");
                }
                yield outcome;
            }
            tracing::info!(done, total, "bm25 search finished");
        })
    }

    /// Run [`submit`](Self::submit) to completion.
    pub async fn run<I>(&self, queries: I) -> PoolReport
    where
        I: IntoIterator<Item = String>,
    {
        let mut report = PoolReport::default();
        let mut stream = self.submit(queries);
        while let Some(outcome) = stream.next().await {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(failure) => report.failures.push(failure),
            }
        }
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failures.len(),
                scored = report.records.len(),
                "some queries failed; resubmit them"
            );
        }
        report
    }
}

/// Score one query under the retry policy.
///
/// Every blocking scorer holds a slot from `scorer_slots` until it returns,
/// including one whose attempt already timed out. A retry therefore waits for
/// a free slot and the number of running scorers never exceeds the pool size.
async fn score_with_retry<S: QueryScorer>(
    scorer: &Arc<S>,
    config: &PoolConfig,
    scorer_slots: &Arc<Semaphore>,
    query: String,
) -> Result<MatchRecord, QueryFailure> {
    let top_k = config.top_k;
    let timeout = config.task_timeout;

    let result = config
        .retry
        .run(|attempt| {
            let scorer = scorer.clone();
            let query = query.clone();
            let scorer_slots = scorer_slots.clone();
            async move {
                let label = query.clone();
                let slot = scorer_slots.acquire_owned().await.map_err(|e| {
                    SieveError::Retrieval(format!("scorer slots closed for {label:?}: {e}"))
                })?;
                let task = tokio::task::spawn_blocking(move || {
                    let _slot = slot;
                    scorer.score_query(&query, top_k)
                });
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join)) => Err(SieveError::Retrieval(format!(
                        "scoring task for {label:?} aborted: {join}"
                    ))),
                    Err(_) => Err(SieveError::Timeout(format!(
                        "query {label:?} exceeded {timeout:?} on attempt {}",
                        attempt + 1
                    ))),
                }
            }
        })
        .await;

    result.map_err(|e| QueryFailure {
        query,
        attempts: e.attempts,
        error: e.error,
    })
}
