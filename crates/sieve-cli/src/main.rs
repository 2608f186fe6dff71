mod commands;

use clap::{Parser, Subcommand};
use sieve::core::SieveError;
use tracing::Level;

use crate::commands::{ContextsArgs, EvaluateArgs, PredictAllArgs, RerankArgs, SearchArgs};

#[derive(Debug, Parser)]
#[command(name = "sieve", version)]
#[command(about = "Two-stage evidence retrieval and cluster-robust set evaluation")]
struct Cli {
    /// More log output: -v for debug, -vv for trace.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Shortlist documents for every candidate and question with BM25.
    Search(SearchArgs),
    /// Re-rank shortlisted sentences densely and attach them to examples.
    Rerank(RerankArgs),
    /// Format model inputs under a context strategy.
    Contexts(ContextsArgs),
    /// Baseline predictions: every candidate of every example.
    PredictAll(PredictAllArgs),
    /// Score a prediction file against a dataset.
    Evaluate(EvaluateArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), SieveError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Search(args) => commands::search(args).await,
        Commands::Rerank(args) => commands::rerank(args).await,
        Commands::Contexts(args) => commands::contexts(args).await,
        Commands::PredictAll(args) => commands::predict_all(args).await,
        Commands::Evaluate(args) => commands::evaluate(args).await,
    }
}
