// src/cli.rs

use crate::config::PersistencePolicy;
use crate::model::Level;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the git repository the versions were mined from.
    /// Defaults to the url stored for --repository
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// SQLite database holding repositories, commits, versions and features
    #[arg(short, long)]
    pub database: PathBuf,

    /// Only process versions of the repository with this name
    #[arg(long)]
    pub repository: Option<String>,

    /// TOML file with extraction settings; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Metric extractor to run (repeatable)
    #[arg(short, long = "extractor")]
    pub extractors: Vec<String>,

    /// Compute n-gram vectors
    #[arg(long, conflicts_with = "no_ngrams")]
    pub ngrams: bool,

    /// Skip n-gram vectors
    #[arg(long)]
    pub no_ngrams: bool,

    /// Number of versions per partition (one transaction each)
    #[arg(long)]
    pub partition_size: Option<usize>,

    /// Smallest n-gram order
    #[arg(long)]
    pub ngram_min: Option<usize>,

    /// Largest n-gram order
    #[arg(long)]
    pub ngram_max: Option<usize>,

    /// N-gram granularity level (repeatable)
    #[arg(long = "level", value_enum)]
    pub levels: Vec<Level>,

    /// What to do when a partition fails to persist
    #[arg(long, value_enum)]
    pub on_persistence_error: Option<PersistencePolicy>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}
