//! Dataset ingestion: line-delimited question records -> embeddings -> collection.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::question::{prepare_record, PreparedRecord};
use crate::semantic::{Embedder, UpsertBatch, VectorStore};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Non-blank lines read
    pub records: usize,
    pub indexed: usize,
    /// Records without an id or title
    pub skipped: usize,
    /// Upsert calls made
    pub batches: usize,
}

/// Ingest a dataset file into `store`, then persist it.
pub fn ingest_file(
    path: &Path,
    embedder: &dyn Embedder,
    store: &mut dyn VectorStore,
    opts: &IngestOptions,
) -> anyhow::Result<IngestReport> {
    let file = File::open(path).with_context(|| format!("failed to open dataset {}", path.display()))?;
    ingest_reader(BufReader::new(file), embedder, store, opts)
}

/// Ingest line-delimited JSON records from `reader`.
///
/// Any parse, embedding or storage failure aborts the run. Batches already
/// upserted stay in `store` but are only persisted when the whole input succeeds.
pub fn ingest_reader<R: BufRead>(
    reader: R,
    embedder: &dyn Embedder,
    store: &mut dyn VectorStore,
    opts: &IngestOptions,
) -> anyhow::Result<IngestReport> {
    anyhow::ensure!(opts.batch_size > 0, "batch size must be greater than 0");

    let progress = if opts.show_progress {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}: {pos} records [{elapsed}]") {
            bar.set_style(style);
        }
        bar.set_message("Processing questions");
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut report = IngestReport::default();
    let mut pending: Vec<PreparedRecord> = Vec::with_capacity(opts.batch_size);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("line {} is not valid JSON", line_no + 1))?;
        report.records += 1;
        progress.inc(1);

        let Some(record) = prepare_record(value) else {
            report.skipped += 1;
            continue;
        };

        pending.push(record);

        if pending.len() >= opts.batch_size {
            flush_batch(&mut pending, embedder, store, &mut report)?;
        }
    }

    if !pending.is_empty() {
        flush_batch(&mut pending, embedder, store, &mut report)?;
    }

    progress.finish_and_clear();

    store.persist().context("failed to persist collection")?;

    log::info!(
        "ingested {} of {} records in {} batches ({} skipped)",
        report.indexed,
        report.records,
        report.batches,
        report.skipped
    );

    Ok(report)
}

fn flush_batch(
    pending: &mut Vec<PreparedRecord>,
    embedder: &dyn Embedder,
    store: &mut dyn VectorStore,
    report: &mut IngestReport,
) -> anyhow::Result<()> {
    let mut batch = UpsertBatch::default();
    for record in pending.drain(..) {
        batch.ids.push(record.id);
        batch.documents.push(record.document);
        batch.metadatas.push(record.metadata);
    }

    batch.embeddings = embedder
        .embed_batch(&batch.documents)
        .context("failed to embed batch")?;

    let size = batch.len();
    store.upsert(batch).context("failed to upsert batch")?;

    report.indexed += size;
    report.batches += 1;
    log::debug!("upserted batch {} ({size} records)", report.batches);

    Ok(())
}
