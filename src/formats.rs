use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadRecord {
    pub title: String,
    pub book_id: String,
    pub isbn: String,
    pub url: String,
    /// Unix epoch seconds.
    pub timestamp: f64,
}

/// Summary of the most recent run. Not cumulative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<f64>,
}

/// On-disk shape of `download_log.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerFile {
    pub downloaded: BTreeMap<String, DownloadRecord>,
    pub failed: BTreeMap<String, u32>,
    pub stats: LedgerStats,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

pub fn epoch_secs_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
