use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::FetchArgs;
use crate::fetch::{CoverFetcher, FetchSettings};
use crate::formats::{DownloadRecord, LedgerStats, epoch_secs_now};
use crate::ledger::{Ledger, SkipDecision};
use crate::normalize::{clean_isbn, cover_filename};
use crate::reading_list::{BookRow, ReadingList};
use crate::sources::CoverSources;

pub const DEFAULT_DELAY_MS: u64 = 500;
pub const DEFAULT_CHECKPOINT_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Pause after every book that hit the network.
    pub delay: Duration,
    /// Save the ledger after this many processed books.
    pub checkpoint_every: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Finished books with a title.
    pub processed: usize,
    /// Covers fetched during this run.
    pub downloaded: usize,
    /// Books whose every candidate failed during this run.
    pub failed: usize,
    pub skipped_downloaded: usize,
    pub skipped_exhausted: usize,
    /// Rows ignored because the book is not finished.
    pub not_finished: usize,
}

impl RunSummary {
    fn ledger_stats(&self) -> LedgerStats {
        LedgerStats {
            total: self.processed as u64,
            success: self.downloaded as u64,
            failed: self.processed.saturating_sub(self.downloaded) as u64,
            last_run: Some(epoch_secs_now()),
        }
    }
}

/// Per-book outcome of [`CoverPipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum BookOutcome {
    Downloaded,
    Failed,
    Skipped(SkipDecision),
}

pub struct CoverPipeline {
    fetcher: CoverFetcher,
    sources: CoverSources,
    out_dir: PathBuf,
    settings: PipelineSettings,
}

impl CoverPipeline {
    pub fn new(
        fetcher: CoverFetcher,
        sources: CoverSources,
        out_dir: impl Into<PathBuf>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            sources,
            out_dir: out_dir.into(),
            settings,
        }
    }

    /// Resolves a cover for every finished book in `rows`, in order, and
    /// finalizes the ledger with this run's stats.
    ///
    /// An `Err` row aborts the run. Progress made so far is saved first.
    pub async fn run(
        &self,
        rows: impl IntoIterator<Item = anyhow::Result<BookRow>>,
        ledger: &mut Ledger,
    ) -> anyhow::Result<RunSummary> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("create output dir: {}", self.out_dir.display()))?;

        let mut summary = RunSummary::default();
        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    if let Err(save_err) = ledger.save() {
                        tracing::warn!(error = %format!("{save_err:#}"), "failed to save ledger");
                    }
                    return Err(err.context("read reading list"));
                }
            };
            if !row.is_finished() {
                summary.not_finished += 1;
                continue;
            }
            let title = row.title.trim();
            if title.is_empty() {
                tracing::debug!(book_id = %row.book_id, "skipping finished row without title");
                continue;
            }
            summary.processed += 1;

            match self.process(&row, title, ledger).await {
                BookOutcome::Downloaded => summary.downloaded += 1,
                BookOutcome::Failed => summary.failed += 1,
                BookOutcome::Skipped(SkipDecision::AlreadyDownloaded) => {
                    summary.skipped_downloaded += 1;
                }
                BookOutcome::Skipped(_) => summary.skipped_exhausted += 1,
            }

            if self.settings.checkpoint_every > 0
                && summary.processed % self.settings.checkpoint_every == 0
            {
                ledger.save().context("checkpoint ledger")?;
            }
        }

        ledger
            .finalize(summary.ledger_stats())
            .context("finalize ledger")?;
        Ok(summary)
    }

    async fn process(&self, row: &BookRow, title: &str, ledger: &mut Ledger) -> BookOutcome {
        let book_id = row.book_id.trim();
        let isbn = clean_isbn(&row.isbn);
        let filename = cover_filename(book_id, title);

        match ledger.should_skip(&filename) {
            SkipDecision::Proceed => {}
            SkipDecision::AlreadyDownloaded => {
                tracing::info!(title, %filename, "skipping: already downloaded");
                return BookOutcome::Skipped(SkipDecision::AlreadyDownloaded);
            }
            decision @ SkipDecision::ExhaustedRetries { attempts } => {
                tracing::info!(title, %filename, attempts, "skipping: failed too many times");
                return BookOutcome::Skipped(decision);
            }
        }

        tracing::info!(title, author = %row.author, book_id, %isbn, "processing");
        let candidates = self.sources.candidate_urls(&isbn, book_id, title);
        let dest = self.out_dir.join(&filename);

        let mut outcome = None;
        for (idx, url) in candidates.iter().enumerate() {
            tracing::info!(
                source = idx + 1,
                of = candidates.len(),
                %url,
                "trying source"
            );
            match self.fetcher.fetch(url, &dest).await {
                Ok(cover) => {
                    tracing::info!(title, %filename, bytes = cover.bytes, "downloaded");
                    ledger.record_success(
                        &filename,
                        DownloadRecord {
                            title: title.to_owned(),
                            book_id: book_id.to_owned(),
                            isbn: isbn.clone(),
                            url: cover.url,
                            timestamp: epoch_secs_now(),
                        },
                    );
                    outcome = Some(BookOutcome::Downloaded);
                    break;
                }
                Err(err) => {
                    tracing::info!(%url, reason = %err, "source rejected");
                }
            }
        }

        let outcome = outcome.unwrap_or_else(|| {
            let attempts = ledger.record_failure(&filename);
            tracing::warn!(
                title,
                %filename,
                candidates = candidates.len(),
                attempts,
                "all sources failed"
            );
            BookOutcome::Failed
        });

        if !self.settings.delay.is_zero() {
            tokio::time::sleep(self.settings.delay).await;
        }
        outcome
    }
}

pub async fn run(args: FetchArgs) -> anyhow::Result<RunSummary> {
    let csv_path = PathBuf::from(&args.csv);
    let out_dir = PathBuf::from(&args.out);

    let sources = CoverSources::new(
        &args.open_library_base,
        &args.google_books_base,
        &args.amazon_images_base,
    )
    .context("configure cover sources")?;
    let fetcher = CoverFetcher::new(&FetchSettings {
        timeout: Duration::from_secs(args.timeout_secs),
        user_agent: args.user_agent.clone(),
        min_bytes: args.min_bytes,
    })?;
    let pipeline = CoverPipeline::new(
        fetcher,
        sources,
        &out_dir,
        PipelineSettings {
            delay: Duration::from_millis(args.delay_ms),
            checkpoint_every: args.checkpoint_every,
        },
    );

    let rows = ReadingList::open(&csv_path).context("open reading list")?;
    let mut ledger = Ledger::load(Ledger::path_in(&out_dir)).with_max_attempts(args.max_attempts);

    tracing::info!(csv = %csv_path.display(), out = %out_dir.display(), "reading books");
    let summary = pipeline.run(rows, &mut ledger).await?;
    tracing::info!(
        processed = summary.processed,
        downloaded = summary.downloaded,
        failed = summary.failed,
        "run complete"
    );
    Ok(summary)
}

pub fn render_summary(summary: &RunSummary, out_dir: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Download complete");
    let _ = writeln!(out, "  total books processed: {}", summary.processed);
    let _ = writeln!(out, "  successfully downloaded: {}", summary.downloaded);
    let _ = writeln!(
        out,
        "  not downloaded: {} (already had {}, failed {}, out of retries {})",
        summary.processed.saturating_sub(summary.downloaded),
        summary.skipped_downloaded,
        summary.failed,
        summary.skipped_exhausted,
    );
    let _ = writeln!(out, "  images saved to: {}", out_dir.display());
    out
}
