// src/main.rs

mod cli;
mod config;
mod error;
mod features;
mod model;
mod orchestrator;
mod registry;
mod source;
mod store;
mod syntax;
mod vocabulary;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Args;
use config::Config;
use features::ngram::NGramExtractor;
use orchestrator::Orchestrator;
use registry::Registry;
use source::GitSource;
use std::path::PathBuf;
use std::time::Instant;
use store::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let start_time = Instant::now();
    info!("Starting feature extractor");

    // Setup: any failure here aborts before a single partition runs.
    let config = Config::resolve(&args).context("Configuration could not be resolved")?;
    let store = Store::open(&args.database)
        .with_context(|| format!("Database {} could not be opened", args.database.display()))?;

    let repo_path = match (&args.repo, &args.repository) {
        (Some(path), _) => path.clone(),
        (None, Some(name)) => match store.repository_url(name)? {
            Some(url) => PathBuf::from(url),
            None => bail!("No repository found with name {name}"),
        },
        (None, None) => bail!("Either --repo or --repository is required"),
    };
    let source = GitSource::open(&repo_path)?;

    let repository = args.repository.as_deref();
    let versions = store
        .versions(repository)
        .context("Versions could not be listed")?;
    let commits = store
        .commits(repository)
        .context("Commits could not be listed")?;
    info!(
        versions = versions.len(),
        commits = commits.len(),
        "Loaded corpus"
    );

    let registry = Registry::builtin();
    info!(
        available = ?registry.names().collect::<Vec<_>>(),
        requested = ?config.extractors,
        "Resolving feature groups"
    );
    let groups = registry.resolve(&config.extractors);
    let ngrams = config
        .ngrams
        .then(|| NGramExtractor::new(config.levels.clone(), config.orders()));
    if let Some(extractor) = &ngrams {
        info!(
            levels = ?extractor.levels(),
            orders = ?extractor.orders(),
            "N-gram extraction enabled"
        );
    }

    let orchestrator = Orchestrator {
        source: &source,
        store: &store,
        groups: &groups,
        ngrams: ngrams.as_ref(),
        partition_size: config.partition_size,
        policy: config.on_persistence_error,
    };
    let summary = orchestrator.run(&versions, &commits)?;

    print!("{summary}");
    println!("Total time: {:.2?}", start_time.elapsed());
    info!("Feature extractor is done");
    Ok(())
}
