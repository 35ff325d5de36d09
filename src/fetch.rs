use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::AsyncWriteExt as _;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Anything smaller is assumed to be a placeholder or error image.
pub const DEFAULT_MIN_BYTES: u64 = 1000;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Applies to connecting and to each read of the response, not to the
    /// transfer as a whole. A slow but steady download is not cut off.
    pub timeout: Duration,
    pub user_agent: String,
    pub min_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            min_bytes: DEFAULT_MIN_BYTES,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("unexpected status {0}")]
    BadStatus(u16),
    #[error("not an image (content-type {0:?})")]
    WrongType(String),
    #[error("too small ({bytes} bytes)")]
    TooSmall { bytes: u64 },
    #[error("write cover: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCover {
    pub url: String,
    pub bytes: u64,
    pub content_type: String,
}

/// Downloads one candidate URL at a time and keeps it only if it looks like a
/// real cover image.
#[derive(Debug, Clone)]
pub struct CoverFetcher {
    client: reqwest::Client,
    min_bytes: u64,
}

impl CoverFetcher {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .read_timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build cover http client")?;

        Ok(Self {
            client,
            min_bytes: settings.min_bytes,
        })
    }

    /// Fetches `url` into `dest`, overwriting whatever is there.
    ///
    /// On any error no file is left at `dest` by this call.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchedCover, FetchError> {
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("image") {
            return Err(FetchError::WrongType(content_type));
        }

        let declared_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(bytes) = declared_len
            && bytes < self.min_bytes
        {
            return Err(FetchError::TooSmall { bytes });
        }

        let written = match stream_to_file(&mut response, dest).await {
            Ok(written) => written,
            Err(err) => {
                remove_partial(dest).await;
                return Err(err);
            }
        };

        let bytes = match tokio::fs::metadata(dest).await {
            Ok(meta) => meta.len(),
            Err(err) => {
                remove_partial(dest).await;
                return Err(err.into());
            }
        };
        if bytes < self.min_bytes {
            remove_partial(dest).await;
            return Err(FetchError::TooSmall { bytes });
        }

        tracing::debug!(url, bytes, written, %content_type, "cover stored");
        Ok(FetchedCover {
            url: url.to_owned(),
            bytes,
            content_type,
        })
    }
}

async fn stream_to_file(response: &mut reqwest::Response, dest: &Path) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0_u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %dest.display(), ?err, "failed to remove rejected cover");
        }
    }
}
