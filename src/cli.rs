use clap::{Args, Parser, Subcommand};

use crate::fetch::{DEFAULT_MIN_BYTES, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::ledger::DEFAULT_MAX_ATTEMPTS;
use crate::pipeline::{DEFAULT_CHECKPOINT_EVERY, DEFAULT_DELAY_MS};
use crate::sources::{
    DEFAULT_AMAZON_IMAGES_BASE, DEFAULT_GOOGLE_BOOKS_BASE, DEFAULT_OPEN_LIBRARY_BASE,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download covers for every finished book in a library export.
    Fetch(FetchArgs),
    /// Summarize the download ledger without touching the network.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Library export CSV (Goodreads format).
    #[arg(long, default_value = "books.csv")]
    pub csv: String,

    /// Output directory for cover images and `download_log.json`.
    #[arg(long, default_value = "img-books")]
    pub out: String,

    /// Pause after each book that was looked up (politeness).
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Connect timeout, and the longest wait for any single read of a response.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Smallest response accepted as a real cover.
    #[arg(long, default_value_t = DEFAULT_MIN_BYTES)]
    pub min_bytes: u64,

    /// Runs in which every source failed before a book is skipped for good.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Save the ledger after this many processed books (0 = only at the end).
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    pub checkpoint_every: usize,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, default_value = DEFAULT_OPEN_LIBRARY_BASE)]
    pub open_library_base: String,

    #[arg(long, default_value = DEFAULT_GOOGLE_BOOKS_BASE)]
    pub google_books_base: String,

    #[arg(long, default_value = DEFAULT_AMAZON_IMAGES_BASE)]
    pub amazon_images_base: String,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Output directory holding `download_log.json`.
    #[arg(long, default_value = "img-books")]
    pub out: String,

    /// Failure count at which a book counts as exhausted.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}
