//! Shared on-disk cache primitives for espresso
//!
//! - [`CacheLock`]: advisory lock around check-then-populate sequences
//! - [`Fetch`] / [`HttpFetcher`]: the network seam
//! - [`download_atomic`]: temp-file-then-rename downloads

mod fetch;
mod lock;

pub use fetch::{download_atomic, Fetch, FetchError, FetchResult, HttpFetcher};
pub use lock::{CacheLock, LockError, LockResult, DEFAULT_LOCK_TIMEOUT};
