//! Sequential question scraper with a resumable checkpoint.

mod extract;
mod fetch;

pub use extract::{extract_answer_body, ExtractError, PageExtractor, ScrapedPage, StackOverflowExtractor};
pub use fetch::{HttpPageSource, PageSource, ScrapeError};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;

use crate::storage::StorageManager;

/// Checkpoint assumed when the checkpoint file is missing or unreadable.
pub const DEFAULT_CHECKPOINT: u64 = 1;

/// Cleaned question title -> answer text.
pub type Corpus = BTreeMap<String, String>;

/// Last successfully scraped question ID.
pub fn read_checkpoint(store: &dyn StorageManager, ident: &str) -> u64 {
    if !store.exists(ident) {
        return DEFAULT_CHECKPOINT;
    }

    store
        .read(ident)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_CHECKPOINT)
}

/// Corpus and checkpoint files of a scraper run.
pub struct ScrapeState {
    store: Box<dyn StorageManager>,
    data_file: String,
    checkpoint_file: String,
    corpus: Corpus,
}

impl ScrapeState {
    /// Loads the existing corpus, or starts an empty one.
    pub fn load(
        store: Box<dyn StorageManager>,
        data_file: &str,
        checkpoint_file: &str,
    ) -> anyhow::Result<Self> {
        let corpus = if store.exists(data_file) {
            let bytes = store
                .read(data_file)
                .with_context(|| format!("failed to read {data_file}"))?;
            serde_json::from_slice(&bytes).with_context(|| format!("{data_file} is not a JSON object of strings"))?
        } else {
            Corpus::new()
        };

        Ok(Self {
            store,
            data_file: data_file.to_string(),
            checkpoint_file: checkpoint_file.to_string(),
            corpus,
        })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn last_scraped_id(&self) -> u64 {
        read_checkpoint(self.store.as_ref(), &self.checkpoint_file)
    }

    /// First ID of a resumed run.
    pub fn resume_id(&self) -> u64 {
        self.last_scraped_id().saturating_add(1)
    }

    fn record(&mut self, question_id: u64, page: ScrapedPage) -> std::io::Result<()> {
        self.corpus.insert(page.title, page.answer_text);
        self.store
            .write(&self.checkpoint_file, question_id.to_string().as_bytes())
    }

    /// Writes the whole corpus as pretty JSON with 4-space indentation.
    pub fn save_corpus(&self) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.corpus.serialize(&mut ser)?;

        self.store
            .write(&self.data_file, &buf)
            .with_context(|| format!("failed to write {}", self.data_file))
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Pause between two consecutive requests
    pub delay: Duration,
    /// Write the corpus every this many processed IDs
    pub save_every: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            save_every: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub processed: u64,
    pub scraped: u64,
    /// Pages that loaded but did not look like an answered question
    pub skipped: u64,
    /// Fetch failures
    pub failed: u64,
}

pub struct Scraper<'a> {
    source: &'a dyn PageSource,
    extractor: &'a dyn PageExtractor,
    opts: ScrapeOptions,
    stop: Arc<AtomicBool>,
}

impl<'a> Scraper<'a> {
    pub fn new(source: &'a dyn PageSource, extractor: &'a dyn PageExtractor, opts: ScrapeOptions) -> Self {
        Self {
            source,
            extractor,
            opts,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the run after the current ID when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Scans `start..=end`. Per-ID failures are logged and skipped; only the final
    /// corpus write can fail the run.
    pub fn run(&self, state: &mut ScrapeState, start: u64, end: u64) -> anyhow::Result<ScrapeReport> {
        let mut report = ScrapeReport::default();

        log::info!("starting scrape from question ID {start} to {end}");

        for question_id in start..=end {
            if self.stopped() {
                log::warn!("stop requested, ending scrape before ID {question_id}");
                break;
            }

            self.process(state, question_id, &mut report);
            report.processed += 1;

            if report.processed % self.opts.save_every == 0 {
                match state.save_corpus() {
                    Ok(()) => log::info!("progress saved ({} entries)", state.corpus().len()),
                    Err(err) => log::error!("failed to save progress: {err:#}"),
                }
            }

            if question_id < end {
                self.pause();
            }
        }

        state.save_corpus()?;
        log::info!(
            "scraping finished: {} processed, {} scraped, {} skipped, {} failed",
            report.processed,
            report.scraped,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    fn process(&self, state: &mut ScrapeState, question_id: u64, report: &mut ScrapeReport) {
        log::info!("scraping question ID {question_id}");

        let html = match self.source.fetch(question_id) {
            Ok(html) => html,
            Err(err) => {
                log::warn!("{question_id}: {err}, skipping");
                report.failed += 1;
                return;
            }
        };

        let page = match self.extractor.extract(&html) {
            Ok(page) => page,
            Err(err) => {
                log::info!("{question_id}: {err}, skipping");
                report.skipped += 1;
                return;
            }
        };

        log::info!("{question_id}: scraped '{}'", page.title);
        report.scraped += 1;

        if let Err(err) = state.record(question_id, page) {
            log::error!("{question_id}: failed to write checkpoint: {err}");
        }
    }

    fn pause(&self) {
        let deadline = Instant::now() + self.opts.delay;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }
}
