use std::path::PathBuf;

use serde::Serialize;

use crate::cli::StatusArgs;
use crate::formats::LedgerStats;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStatus {
    pub ledger_path: String,
    pub downloaded: usize,
    /// Filenames with at least one failure that may still be retried.
    pub retrying: usize,
    /// Filenames that reached the failure threshold.
    pub exhausted: usize,
    pub last_run: LedgerStats,
}

pub fn summarize(ledger: &Ledger) -> LedgerStatus {
    let contents = ledger.contents();
    let exhausted = contents
        .failed
        .iter()
        .filter(|(name, count)| {
            **count >= ledger.max_attempts() && !contents.downloaded.contains_key(name.as_str())
        })
        .count();
    let retrying = contents
        .failed
        .keys()
        .filter(|name| !contents.downloaded.contains_key(name.as_str()))
        .count()
        - exhausted;

    LedgerStatus {
        ledger_path: ledger.path().display().to_string(),
        downloaded: contents.downloaded.len(),
        retrying,
        exhausted,
        last_run: contents.stats.clone(),
    }
}

pub fn run(args: StatusArgs) -> anyhow::Result<String> {
    let out_dir = PathBuf::from(&args.out);
    let ledger = Ledger::load(Ledger::path_in(&out_dir)).with_max_attempts(args.max_attempts);
    let status = summarize(&ledger);

    if args.json {
        let mut out = serde_json::to_string_pretty(&status)?;
        out.push('\n');
        return Ok(out);
    }

    let last_run = match status.last_run.last_run {
        Some(secs) => chrono::DateTime::from_timestamp(secs as i64, 0)
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| secs.to_string()),
        None => "never".to_owned(),
    };
    Ok(format!(
        "ledger: {}\n\
         downloaded: {}\n\
         failing (will retry): {}\n\
         failing (gave up): {}\n\
         last run: {} (processed {}, downloaded {}, not downloaded {})\n",
        status.ledger_path,
        status.downloaded,
        status.retrying,
        status.exhausted,
        last_run,
        status.last_run.total,
        status.last_run.success,
        status.last_run.failed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LEDGER_FILE_NAME;

    #[test]
    fn summarize_splits_retrying_and_exhausted() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join(LEDGER_FILE_NAME);
        std::fs::write(
            &path,
            r#"{
  "downloaded": {"1.jpg": {"title": "One"}, "4.jpg": {"title": "Four"}},
  "failed": {"2.jpg": 1, "3.jpg": 3, "4.jpg": 5},
  "stats": {"total": 4, "success": 1, "failed": 3, "last_run": 1700000000.25}
}"#,
        )?;

        let status = summarize(&Ledger::load(&path));
        assert_eq!(status.downloaded, 2);
        assert_eq!(status.retrying, 1);
        assert_eq!(status.exhausted, 1);
        assert_eq!(status.last_run.total, 4);
        assert_eq!(status.last_run.last_run, Some(1_700_000_000.25));
        Ok(())
    }

    #[test]
    fn run_reports_empty_ledger() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let text = run(StatusArgs {
            out: temp.path().to_string_lossy().to_string(),
            max_attempts: 3,
            json: false,
        })?;

        assert!(text.contains("downloaded: 0\n"));
        assert!(text.contains("last run: never"));
        assert!(!temp.path().join(LEDGER_FILE_NAME).exists());
        Ok(())
    }
}
