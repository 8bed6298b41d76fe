//! libcurl-backed fetcher (one blocking Easy handle per fetch).

use std::io;

use super::{CurlOptions, Fetch, FetchRequest, TransferWatch};
use crate::error::SyncError;
use crate::storage::PartFile;

/// Default [`Fetch`] implementation.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    options: CurlOptions,
}

impl CurlFetcher {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CurlOptions {
        &self.options
    }

    fn configure(
        &self,
        easy: &mut curl::easy::Easy,
        request: &FetchRequest<'_>,
    ) -> Result<(), curl::Error> {
        let opts = &self.options;
        easy.url(request.remote.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(opts.max_redirections)?;
        easy.connect_timeout(opts.connect_timeout)?;
        easy.low_speed_limit(opts.low_speed_limit)?;
        easy.low_speed_time(opts.low_speed_time)?;
        easy.timeout(opts.timeout)?;
        easy.progress(true)?;
        if let Some(agent) = &opts.user_agent {
            easy.useragent(agent)?;
        }

        // Never let an intermediary hand back a cached copy.
        let mut list = curl::easy::List::new();
        list.append("Cache-Control: no-cache")?;
        list.append("Pragma: no-cache")?;
        if let Some(accept) = request.accept {
            list.append(&format!("Accept: {}", accept.trim()))?;
        }
        easy.http_headers(list)?;
        Ok(())
    }
}

/// Run the transfer, streaming the body into `part`. A failed disk write is
/// parked in `storage_error` and surfaces from curl as a write error.
fn perform(
    easy: &mut curl::easy::Easy,
    part: &mut PartFile,
    storage_error: &mut Option<io::Error>,
    watch: TransferWatch<'_>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.write_function(|data| match part.write_chunk(data) {
        Ok(()) => Ok(data.len()),
        Err(e) => {
            *storage_error = Some(e);
            Ok(0) // abort transfer
        }
    })?;
    transfer.progress_function(move |dl_total, dl_now, _, _| {
        if watch.cancelled() {
            return false;
        }
        if let Some(report) = watch.on_progress {
            let total = (dl_total > 0.0).then_some(dl_total as u64);
            report(dl_now as u64, total);
        }
        true
    })?;
    transfer.perform()
}

fn is_http(request: &FetchRequest<'_>) -> bool {
    matches!(request.remote.scheme(), "http" | "https")
}

impl Fetch for CurlFetcher {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<u64, SyncError> {
        let url = request.remote.to_string();
        let transfer_err = |source| SyncError::Transfer {
            url: url.clone(),
            source,
        };
        if request.watch.cancelled() {
            return Err(SyncError::Cancelled { url });
        }

        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, request).map_err(transfer_err)?;

        let mut part = PartFile::create(request.destination)
            .map_err(|e| SyncError::write(request.destination, e))?;
        let mut storage_error: Option<io::Error> = None;
        let watch = request.watch;
        let performed = perform(&mut easy, &mut part, &mut storage_error, watch);

        if let Err(e) = performed {
            part.discard();
            if e.is_aborted_by_callback() || watch.cancelled() {
                return Err(SyncError::Cancelled { url });
            }
            if e.is_write_error() {
                if let Some(io_err) = storage_error {
                    return Err(SyncError::write(request.destination, io_err));
                }
            }
            return Err(transfer_err(e));
        }

        if is_http(request) {
            let code = match easy.response_code() {
                Ok(code) => code,
                Err(e) => {
                    part.discard();
                    return Err(transfer_err(e));
                }
            };
            if !(200..300).contains(&code) {
                part.discard();
                return Err(SyncError::Http { url, status: code });
            }
        }

        let written = part
            .finalize(request.destination)
            .map_err(|e| SyncError::write(request.destination, e))?;
        tracing::debug!(
            "fetched {} -> {} ({} bytes)",
            url,
            request.destination.display(),
            written
        );
        Ok(written)
    }
}
