//! recall - local hybrid retrieval over feedback and lessons.
//!
//! ```bash
//! recall --index                       # embed feedback + lessons into LanceDB
//! recall --query "spread calculation"  # hybrid (or lexical) search
//! recall --context                     # start-of-session digest
//! recall --status | --metrics
//! ```
use anyhow::Result;
use clap::{CommandFactory, Parser};
use recall_cli::{commands, App};
use recall_core::config::Config;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Semantic memory: BM25 + vector search over feedback and lessons.
#[derive(Parser)]
#[command(name = "recall", version, about)]
struct Cli {
    /// Index all feedback and lessons
    #[arg(long)]
    index: bool,

    /// Hybrid search query
    #[arg(long)]
    query: Option<String>,

    /// Print session context
    #[arg(long)]
    context: bool,

    /// Show index status
    #[arg(long)]
    status: bool,

    /// Show query metrics
    #[arg(long)]
    metrics: bool,

    /// Number of results
    #[arg(short = 'n', long = "results", default_value = "5")]
    results: usize,

    /// Embedding model
    #[arg(long, value_parser = ["fast", "better"])]
    model: Option<String>,

    /// Memory directory (default: storage.memory_dir)
    #[arg(long)]
    memory_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(recall_core::Error::MissingDependency(what)) = e.downcast_ref::<recall_core::Error>() {
                eprintln!("❌ {what}");
                eprintln!("\nSemantic indexing needs a local sentence-embedding model.");
                eprintln!("   Queries still work without it (lexical ranking).");
                eprintln!("   Set RECALL_USE_FAKE_EMBEDDINGS=1 to index with the hashing embedder instead.");
                return ExitCode::from(2);
            }
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let app = App::from_config(&config, cli.memory_dir, cli.model)?;
    let mut out = io::stdout().lock();

    if cli.index {
        commands::run_index(&app, &mut out)?;
    } else if let Some(query) = cli.query.as_deref() {
        commands::run_query(&app, query, cli.results, &mut out)?;
    } else if cli.context {
        commands::run_context(&app, &mut out)?;
    } else if cli.status {
        commands::run_status(&app, &mut out)?;
    } else if cli.metrics {
        commands::run_metrics(&app, &mut out)?;
    } else {
        Cli::command().print_help()?;
        println!("\n\nQuick Start:");
        println!("   1. Put the model files under <memory>/model_cache/<model>/");
        println!("   2. recall --index");
        println!("   3. recall --query 'spread calculation'");
        println!("   4. recall --context");
    }
    Ok(())
}
