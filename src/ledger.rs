use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::{DownloadRecord, LedgerFile, LedgerStats};

pub const LEDGER_FILE_NAME: &str = "download_log.json";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Proceed,
    AlreadyDownloaded,
    ExhaustedRetries { attempts: u32 },
}

/// Per-filename record of which covers were fetched and which keep failing.
///
/// Mutations are in-memory only; nothing reaches disk until [`Ledger::save`]
/// or [`Ledger::finalize`].
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    max_attempts: u32,
    file: LedgerFile,
}

impl Ledger {
    pub fn path_in(out_dir: &Path) -> PathBuf {
        out_dir.join(LEDGER_FILE_NAME)
    }

    /// Loads the ledger at `path`. A missing or unreadable file yields an
    /// empty ledger rather than an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match read_ledger_file(&path) {
            Ok(Some(file)) => file,
            Ok(None) => LedgerFile::default(),
            Err(err) => {
                tracing::debug!(path = %path.display(), ?err, "ledger unreadable; starting empty");
                LedgerFile::default()
            }
        };

        Self {
            path,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            file,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn contents(&self) -> &LedgerFile {
        &self.file
    }

    pub fn should_skip(&self, filename: &str) -> SkipDecision {
        if self.file.downloaded.contains_key(filename) {
            return SkipDecision::AlreadyDownloaded;
        }
        match self.file.failed.get(filename) {
            Some(&attempts) if attempts >= self.max_attempts => {
                SkipDecision::ExhaustedRetries { attempts }
            }
            _ => SkipDecision::Proceed,
        }
    }

    /// Records a fetched cover. An existing entry is never replaced. Any
    /// failure count left over from earlier runs is dropped.
    pub fn record_success(&mut self, filename: &str, record: DownloadRecord) -> bool {
        self.file.failed.remove(filename);
        if self.file.downloaded.contains_key(filename) {
            return false;
        }
        self.file.downloaded.insert(filename.to_owned(), record);
        true
    }

    /// Bumps the failure count for `filename` and returns the new count.
    pub fn record_failure(&mut self, filename: &str) -> u32 {
        let attempts = self.file.failed.entry(filename.to_owned()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        *attempts
    }

    pub fn save(&self) -> anyhow::Result<()> {
        write_json_atomic(&self.path, &self.file)
            .with_context(|| format!("save ledger: {}", self.path.display()))
    }

    pub fn finalize(&mut self, stats: LedgerStats) -> anyhow::Result<()> {
        self.file.stats = stats;
        self.save()
    }
}

fn read_ledger_file(path: &Path) -> anyhow::Result<Option<LedgerFile>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let file = serde_json::from_slice(&bytes).context("parse ledger json")?;
    Ok(Some(file))
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let mut data = serde_json::to_vec_pretty(value).context("serialize json")?;
    data.push(b'\n');
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
