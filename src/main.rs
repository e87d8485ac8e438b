use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod answers;
mod app;
mod cli;
mod config;
mod display;
mod ingest;
mod llm;
mod question;
mod scrape;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::AppContext;
use config::Config;
use semantic::{Collection, Embedder, EmbeddingModel, VectorStore};

const HOME_ENV: &str = "STACKSEARCH_HOME";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging();

    let base_path = std::env::var(HOME_ENV).unwrap_or_else(|_| ".".to_string());
    let config = Config::load_with(&base_path)?;

    match args.command {
        cli::Command::Scrape { start, end } => run_scrape(&config, start, end),

        cli::Command::Search { query, num_results } => {
            let ctx = AppContext::from_config(&config)?;
            let hits = ctx.search(&query, num_results)?;
            print!(
                "{}",
                display::SearchResults {
                    query: &query,
                    hits: &hits,
                }
            );
            Ok(())
        }

        cli::Command::Ingest {} => run_ingest(&config),

        cli::Command::Serve { bind } => {
            let ctx = Arc::new(AppContext::from_config(&config)?);
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            web::start_daemon(ctx, &bind)
        }
    }
}

fn run_ingest(config: &Config) -> anyhow::Result<()> {
    let embedder = EmbeddingModel::new(
        &config.embedding.model,
        config.resolve(&config.embedding.cache_dir),
        Some(Duration::from_secs(config.embedding.download_timeout_secs)),
    )
    .context("failed to load embedding model")?;

    let mut collection = Collection::open_or_create(
        &config.resolve(&config.index.path),
        &config.index.collection,
        embedder.model_id_hash(),
        embedder.dimensions(),
    )?;

    let opts = ingest::IngestOptions {
        batch_size: config.ingest.batch_size,
        show_progress: true,
    };

    let dataset = config.resolve(&config.ingest.dataset);
    ingest::ingest_file(&dataset, &embedder, &mut collection, &opts)?;

    println!("Total documents in collection: {}", collection.count());
    Ok(())
}

fn run_scrape(config: &Config, start: Option<u64>, end: Option<u64>) -> anyhow::Result<()> {
    let scraper_config = &config.scraper;

    let store = storage::BackendLocal::new(&config.base_path().to_string_lossy())?;
    let mut state = scrape::ScrapeState::load(
        Box::new(store),
        &scraper_config.data_file,
        &scraper_config.checkpoint_file,
    )?;

    let start = start.unwrap_or_else(|| state.resume_id());
    let end = end.unwrap_or(scraper_config.default_end);
    if start > end {
        bail!("start ID {start} is after end ID {end}");
    }

    let source = scrape::HttpPageSource::from_config(scraper_config);
    let extractor = scrape::StackOverflowExtractor;
    let opts = scrape::ScrapeOptions {
        delay: Duration::from_secs(scraper_config.delay_secs),
        save_every: scraper_config.save_every,
    };
    let scraper = scrape::Scraper::new(&source, &extractor, opts);

    let stop = scraper.stop_handle();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, finishing current question");
        stop.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    let report = scraper.run(&mut state, start, end)?;

    println!(
        "Scraped {} of {} questions ({} skipped, {} failed), {} entries in {}",
        report.scraped,
        report.processed,
        report.skipped,
        report.failed,
        state.corpus().len(),
        scraper_config.data_file
    );
    Ok(())
}
