use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jpaddr::{CancelToken, GeocoderConfig, InMemoryProvider, SearchTarget, WorkerPool};

/// Resolve Japanese addresses, one per input line, into JSON lines.
#[derive(Parser)]
#[command(name = "jpaddr", version)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON dictionary dataset; the bundled demo dataset is used when omitted
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Wildcard character matching any single dictionary character
    #[arg(long)]
    fuzzy: Option<char>,

    /// Search target: all, residential or parcel
    #[arg(long)]
    target: Option<SearchTarget>,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Input file; standard input when omitted
    #[arg(long)]
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GeocoderConfig::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeocoderConfig::default(),
    };
    if let Some(c) = args.fuzzy {
        config.fuzzy_char = Some(c);
    }
    if let Some(t) = args.target {
        config.search_target = t;
    }
    if let Some(n) = args.workers {
        config.base.workers = n;
    }

    let provider = match &args.dictionary {
        Some(path) => InMemoryProvider::load_json(path)
            .with_context(|| format!("loading dictionary {}", path.display()))?,
        None => {
            tracing::info!("no dictionary given, using the demo dataset");
            InMemoryProvider::try_demo().context("loading the demo dataset")?
        }
    };

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening input {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let lines = reader
        .lines()
        .collect::<io::Result<Vec<String>>>()
        .context("reading input")?;

    let mut pool = WorkerPool::new(config, Arc::new(provider)).context("starting worker pool")?;
    let results = pool.run_batch(&lines, &CancelToken::new());
    pool.shutdown();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failed = 0usize;
    for (line, result) in lines.iter().zip(results) {
        match result {
            Ok(r) => writeln!(out, "{}", r.to_json()?)?,
            Err(e) => {
                failed += 1;
                tracing::error!(input = %line, error = %e, "geocode failed");
                let json = serde_json::json!({ "input": line, "error": e.to_string() });
                writeln!(out, "{}", json)?;
            }
        }
    }
    out.flush()?;
    tracing::info!(total = lines.len(), failed, "done");
    Ok(())
}
