use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use futures::StreamExt;
use sieve::context::{predict_all_candidates, ContextBuilder, ContextStrategy, EvidencePolicy};
use sieve::core::{
    load_corpus, load_examples, save_examples, Corpus, Embeddings, Example, RetryPolicy,
    SieveError,
};
use sieve::embeddings::{
    HttpEmbeddings, HttpEmbeddingsConfig, SentenceEmbeddingCache, DEFAULT_SENTENCE_CACHE_CAPACITY,
};
use sieve::eval::{
    align_predictions, evaluate as evaluate_examples, evaluate_files, write_metrics,
};
use sieve::retrieval::{
    attach_evidence, collect_queries, read_match_cache, Bm25Index, Bm25Params, DenseReranker,
    Idf, MatchCacheWriter, PoolConfig, RerankConfig, RetrievalMode, Shortlist, WorkerPool,
};
use sieve::splitters::{RuleSentenceSplitter, SentenceCache, SentenceSplitter};
use tokio::io::AsyncWriteExt;

pub const ENTITY_MATCHES: &str = "bm25_docs_by_entity.jsonl";
pub const QUESTION_MATCHES: &str = "bm25_docs_by_question.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdfVariant {
    /// Negative idf floored at epsilon times the mean idf.
    Okapi,
    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`, never negative.
    Plus,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Corpus JSON: `[{"id", "text"}, ...]` or `[[id, text], ...]`.
    #[arg(long)]
    pub corpus: PathBuf,
    /// Example files whose candidates and questions become queries.
    #[arg(long, required = true)]
    pub data: Vec<PathBuf>,
    /// Directory receiving the entity and question match caches.
    #[arg(long)]
    pub output_dir: PathBuf,
    #[arg(long, default_value_t = 24)]
    pub workers: usize,
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,
    #[arg(long, default_value_t = 10)]
    pub buffer_factor: usize,
    /// Seconds allowed for one scoring attempt.
    #[arg(long, default_value_t = 1200)]
    pub timeout_secs: u64,
    /// Attempts per query, including the first.
    #[arg(long, default_value_t = 3)]
    pub attempts: usize,
    #[arg(long, default_value_t = 1.5)]
    pub k1: f64,
    #[arg(long, default_value_t = 0.75)]
    pub b: f64,
    #[arg(long, value_enum, default_value_t = IdfVariant::Okapi)]
    pub idf: IdfVariant,
    #[arg(long, default_value_t = 0.25)]
    pub epsilon: f64,
}

/// Embedding provider selection shared by dense commands.
#[derive(Debug, Args)]
pub struct EmbeddingArgs {
    /// Base URL of an OpenAI-compatible embeddings service.
    #[arg(long)]
    pub embeddings_url: String,
    #[arg(long, default_value = "text-embedding-3-small")]
    pub passage_model: String,
    /// Separate model for candidate queries; defaults to the passage model.
    #[arg(long)]
    pub query_model: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    /// Seconds allowed for one embedding request.
    #[arg(long, default_value_t = 300)]
    pub embedding_timeout_secs: u64,
    /// Sentence vectors kept in memory; least recently used are dropped.
    #[arg(long, default_value_t = DEFAULT_SENTENCE_CACHE_CAPACITY)]
    pub embedding_cache_size: usize,
}

impl EmbeddingArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    fn http(&self, model: &str) -> Result<Arc<dyn Embeddings>, SieveError> {
        let mut config =
            HttpEmbeddingsConfig::new(&self.embeddings_url, model).with_timeout(self.timeout());
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        Ok(Arc::new(HttpEmbeddings::new(config)?))
    }

    /// Query and passage encoders.
    fn encoders(&self) -> Result<(Arc<dyn Embeddings>, Arc<dyn Embeddings>), SieveError> {
        let passage = self.http(&self.passage_model)?;
        let query = match &self.query_model {
            Some(model) => self.http(model)?,
            None => passage.clone(),
        };
        Ok((query, passage))
    }
}

#[derive(Debug, Args)]
pub struct RerankArgs {
    #[arg(long)]
    pub corpus: PathBuf,
    /// Examples to attach evidence to.
    #[arg(long)]
    pub data: PathBuf,
    /// Match cache produced by `search` (entity cache for closed mode,
    /// question cache for open mode).
    #[arg(long)]
    pub matches: PathBuf,
    /// Sentence cache; built from the corpus when missing.
    #[arg(long)]
    pub sentence_cache: PathBuf,
    /// Where the examples with attached evidence are written.
    #[arg(long)]
    pub output: PathBuf,
    /// `closed` (per candidate) or `open` (per question).
    #[arg(long, default_value_t = RetrievalMode::Closed)]
    pub mode: RetrievalMode,
    #[arg(long, default_value_t = 20)]
    pub top_k: usize,
    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,
    #[arg(long)]
    pub min_score: Option<f32>,
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
    /// Attempts per embedding call, including the first.
    #[arg(long, default_value_t = 3)]
    pub attempts: usize,
    #[command(flatten)]
    pub embeddings: EmbeddingArgs,
}

#[derive(Debug, Args)]
pub struct ContextsArgs {
    #[arg(long)]
    pub data: PathBuf,
    /// JSON Lines output, one context record per line.
    #[arg(long)]
    pub output: PathBuf,
    #[arg(long, default_value_t = ContextStrategy::Question)]
    pub strategy: ContextStrategy,
    /// Dense sentences scoring below this are left out.
    #[arg(long, default_value_t = 0.65)]
    pub min_score: f32,
    #[arg(long, default_value_t = 10)]
    pub max_sentences: usize,
}

#[derive(Debug, Args)]
pub struct PredictAllArgs {
    #[arg(long)]
    pub data: PathBuf,
    #[arg(long)]
    pub output: PathBuf,
    /// Also score the baseline and write its metrics here.
    #[arg(long)]
    pub metrics: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub data: PathBuf,
    #[arg(long)]
    pub predictions: PathBuf,
    /// Aggregate metrics JSON; printed to stdout either way.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Metrics plus per-example scores.
    #[arg(long)]
    pub details: Option<PathBuf>,
}

async fn load_all(paths: &[PathBuf]) -> Result<Vec<Example>, SieveError> {
    let mut examples = Vec::new();
    for path in paths {
        examples.extend(load_examples(path).await?);
    }
    Ok(examples)
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SieveError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SieveError::Parsing(format!("failed to serialize output: {e}")))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", path.display())))
}

pub async fn search(args: SearchArgs) -> Result<(), SieveError> {
    let corpus = Corpus::new(load_corpus(&args.corpus).await?)?;
    let examples = load_all(&args.data).await?;
    let queries = collect_queries(&examples);

    let idf = match args.idf {
        IdfVariant::Okapi => Idf::Okapi {
            epsilon: args.epsilon,
        },
        IdfVariant::Plus => Idf::Plus,
    };
    let params = Bm25Params::default()
        .with_k1(args.k1)
        .with_b(args.b)
        .with_idf(idf);
    let index = Bm25Index::with_params(corpus.documents(), params);
    tracing::info!(documents = index.len(), "bm25 index built");

    let pool = WorkerPool::new(
        index,
        PoolConfig::default()
            .with_workers(args.workers)
            .with_top_k(args.top_k)
            .with_buffer_factor(args.buffer_factor)
            .with_task_timeout(Duration::from_secs(args.timeout_secs))
            .with_retry(RetryPolicy::default().with_max_attempts(args.attempts)),
    );

    let mut failed = Vec::new();
    for (name, set) in [
        (ENTITY_MATCHES, queries.entities),
        (QUESTION_MATCHES, queries.questions),
    ] {
        let path = args.output_dir.join(name);
        let mut writer = MatchCacheWriter::create(&path).await?;
        let mut stream = pool.submit(set);
        while let Some(outcome) = stream.next().await {
            match outcome {
                Ok(record) => writer.write(&record).await?,
                Err(failure) => failed.push(failure.query),
            }
        }
        let written = writer.finish().await?;
        tracing::info!(path = %path.display(), queries = written, "match cache written");
    }

    if !failed.is_empty() {
        return Err(SieveError::Retrieval(format!(
            "{} queries failed and are missing from the caches: {:?}",
            failed.len(),
            failed
        )));
    }
    Ok(())
}

pub async fn rerank(args: RerankArgs) -> Result<(), SieveError> {
    let (query_encoder, passage_encoder) = args.embeddings.encoders()?;
    rerank_with(args, query_encoder, passage_encoder).await
}

/// `rerank` with the encoders already chosen. Passage vectors go through a
/// bounded sentence cache since the same sentences recur across examples.
async fn rerank_with(
    args: RerankArgs,
    query_encoder: Arc<dyn Embeddings>,
    passage_encoder: Arc<dyn Embeddings>,
) -> Result<(), SieveError> {
    let corpus = Arc::new(Corpus::new(load_corpus(&args.corpus).await?)?);
    let mut examples = load_examples(&args.data).await?;

    let splitter: Arc<dyn SentenceSplitter> = Arc::new(RuleSentenceSplitter::new());
    let sentences = Arc::new(
        SentenceCache::load_or_build(&args.sentence_cache, corpus.clone(), splitter).await?,
    );
    let shortlist = Arc::new(Shortlist::from_matches(
        read_match_cache(&args.matches).await?,
        &corpus,
    )?);

    let passage_encoder: Arc<dyn Embeddings> = Arc::new(SentenceEmbeddingCache::new(
        passage_encoder,
        args.embeddings.embedding_cache_size,
    ));
    let mut config = RerankConfig::default()
        .with_task_timeout(args.embeddings.timeout())
        .with_top_k(args.top_k)
        .with_max_batch_size(args.batch_size)
        .with_concurrency(args.concurrency);
    if let Some(floor) = args.min_score {
        config = config.with_min_score(floor);
    }
    let reranker = DenseReranker::new(passage_encoder, corpus, sentences, shortlist)
        .with_query_encoder(query_encoder)
        .with_config(config)
        .with_retry(RetryPolicy::default().with_max_attempts(args.attempts));

    let report = attach_evidence(&reranker, &mut examples, args.mode).await;
    save_examples(&args.output, &examples).await?;

    if !report.is_complete() {
        let ids: Vec<String> = report.failures.iter().map(|(id, _)| id.to_string()).collect();
        return Err(SieveError::Embedding(format!(
            "{} examples have no evidence: {}",
            ids.len(),
            ids.join(", ")
        )));
    }
    Ok(())
}

pub async fn contexts(args: ContextsArgs) -> Result<(), SieveError> {
    let examples = load_examples(&args.data).await?;
    let builder = ContextBuilder::new(args.strategy).with_policy(
        EvidencePolicy::default()
            .with_min_score(args.min_score)
            .with_max_sentences(args.max_sentences),
    );

    let mut out = String::new();
    let mut count = 0usize;
    for example in &examples {
        for record in builder.records(example)? {
            let line = serde_json::to_string(&record)
                .map_err(|e| SieveError::Parsing(format!("failed to serialize context: {e}")))?;
            out.push_str(&line);
            out.push('\n');
            count += 1;
        }
    }

    let mut file = tokio::fs::File::create(&args.output)
        .await
        .map_err(|e| SieveError::Io(format!("cannot create {}: {e}", args.output.display())))?;
    file.write_all(out.as_bytes())
        .await
        .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", args.output.display())))?;
    tracing::info!(strategy = %args.strategy, contexts = count, "contexts written");
    Ok(())
}

pub async fn predict_all(args: PredictAllArgs) -> Result<(), SieveError> {
    let examples = load_examples(&args.data).await?;
    let predictions = predict_all_candidates(&examples);
    predictions.save(&args.output).await?;
    tracing::info!(examples = predictions.len(), "baseline predictions written");

    if let Some(path) = &args.metrics {
        let (kept, aligned) = align_predictions(examples, &predictions)?;
        let evaluation = evaluate_examples(&kept, &aligned)?;
        write_metrics(path, &evaluation.metrics).await?;
    }
    Ok(())
}

pub async fn evaluate(args: EvaluateArgs) -> Result<(), SieveError> {
    let evaluation = evaluate_files(&args.data, &args.predictions).await?;
    if let Some(path) = &args.output {
        write_metrics(path, &evaluation.metrics).await?;
    }
    if let Some(path) = &args.details {
        write_json(path, &evaluation).await?;
    }
    for (name, value) in &evaluation.metrics {
        println!("{name}\t{value:.4}");
    }
    Ok(())
}
