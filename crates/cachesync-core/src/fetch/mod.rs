//! Remote fetch primitive.
//!
//! A fetch is a full, cache-disabled GET of one remote resource into one local
//! path. Content lands in a `.part` file first and replaces the destination
//! only after the transfer succeeded. No ranges, no resume.

mod curl;

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::control::CancelToken;
use crate::error::SyncError;

pub use self::curl::CurlFetcher;

/// Transport tuning shared by every Easy handle a fetcher creates.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard wall-clock limit for a single transfer.
    pub timeout: Duration,
    pub max_redirections: u32,
    pub user_agent: Option<String>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
            max_redirections: 10,
            user_agent: None,
        }
    }
}

/// Hooks a caller can attach to an in-flight transfer.
#[derive(Default, Clone, Copy)]
pub struct TransferWatch<'a> {
    /// Checked while the transfer runs; when set the transfer aborts with
    /// [`SyncError::Cancelled`].
    pub cancel: Option<&'a CancelToken>,
    /// Called with `(bytes_received, total_bytes)`; total is `None` until the
    /// server announced a length.
    pub on_progress: Option<&'a dyn Fn(u64, Option<u64>)>,
}

impl<'a> TransferWatch<'a> {
    pub fn cancelled(&self) -> bool {
        self.cancel.map(CancelToken::is_cancelled).unwrap_or(false)
    }
}

/// One fetch: where from, where to, and how to watch it.
pub struct FetchRequest<'a> {
    pub remote: &'a Url,
    pub destination: &'a Path,
    /// Sent as the `Accept` header when present.
    pub accept: Option<&'a str>,
    pub watch: TransferWatch<'a>,
}

/// Downloads a remote resource over a local path, replacing it on success.
///
/// Implementations must create missing parent directories and must not leave a
/// partially written destination behind on failure.
pub trait Fetch: Send + Sync {
    /// Returns the number of bytes written.
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<u64, SyncError>;
}
