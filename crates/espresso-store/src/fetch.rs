//! Remote fetching and atomic placement of downloaded files
//!
//! Network access goes through the [`Fetch`] trait so registry and artifact
//! caches can be driven by an in-memory fetcher in tests. [`download_atomic`]
//! streams into a temp file beside the destination and renames it into place,
//! so an interrupted download never leaves a file at the final path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Fetch result type
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors from fetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no resource at {url}")]
    NotFound { url: String },

    #[error("failed to stream {url}: {source}")]
    Stream {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of remote bytes.
pub trait Fetch: Send + Sync {
    /// Stream the resource at `url` into `sink`, returning the byte count.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> FetchResult<u64>;
}

/// Blocking HTTP(S) fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Connection timeout applied to every request
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a fetcher with the default client settings.
    pub fn new() -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("espresso/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> FetchResult<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        io::copy(&mut response, sink).map_err(|source| FetchError::Stream {
            url: url.to_string(),
            source,
        })
    }
}

/// Download `url` to `dest` via a temp file and an atomic rename.
///
/// Creates the destination directory if needed. On any failure the temp file
/// is removed and `dest` is left untouched.
pub fn download_atomic(fetcher: &dyn Fetch, url: &str, dest: &Path) -> FetchResult<u64> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| FetchError::Io {
        path: dest.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;

    let mut partial = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(io_err)?;

    let bytes = fetcher.fetch(url, partial.as_file_mut())?;
    partial.as_file_mut().flush().map_err(io_err)?;
    partial.as_file().sync_all().map_err(io_err)?;
    partial.persist(dest).map_err(|e| io_err(e.error))?;

    tracing::debug!(url, dest = %dest.display(), bytes, "download complete");
    Ok(bytes)
}
