//! Blocking curl transfer behind `fetch`.

use std::cell::RefCell;
use std::io;
use std::time::Instant;

use curl::easy::Easy;

use super::{FetchedArchive, ProgressSink, ResponseHeaders, TransferError, TransferRequest};
use crate::control::TransferControl;
use crate::storage::PartFile;

const MAX_REDIRECTS: u32 = 10;

/// Downloads `request.url` into `request.part_path`.
///
/// On success the archive is synced but still under its part-file name; the
/// caller finalizes or discards it. On any error, including cancellation, the
/// part file has already been removed.
pub fn fetch(
    request: &TransferRequest,
    control: &TransferControl,
    sink: &dyn ProgressSink,
) -> Result<FetchedArchive, TransferError> {
    let mut part = PartFile::create(&request.part_path, request.options.buffer_size)
        .map_err(TransferError::Storage)?;

    match perform(request, control, sink, &mut part) {
        Ok(headers) => Ok(FetchedArchive {
            bytes: part.len(),
            content_disposition: headers.content_disposition,
            part,
        }),
        Err(e) => {
            let path = request.part_path.display().to_string();
            if let Err(discard_err) = part.discard() {
                tracing::warn!(path = %path, "could not remove part file: {}", discard_err);
            }
            Err(e)
        }
    }
}

fn perform(
    request: &TransferRequest,
    control: &TransferControl,
    sink: &dyn ProgressSink,
    part: &mut PartFile,
) -> Result<ResponseHeaders, TransferError> {
    let mut easy = Easy::new();
    configure(&mut easy, request).map_err(TransferError::Curl)?;

    let headers = RefCell::new(ResponseHeaders::default());
    let storage_error: RefCell<Option<io::Error>> = RefCell::new(None);
    let interval = request.options.progress_interval;
    let mut last_report = Instant::now();

    tracing::debug!(url = %request.url, "transfer started");
    let result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                let mut h = headers.borrow_mut();
                if h.feed(line) && h.is_success() {
                    sink.on_headers(h.content_length);
                }
                true
            })
            .map_err(TransferError::Curl)?;
        transfer
            .write_function(|data| {
                // Parks here while paused; the connection stays open.
                let Some(permit) = control.enter() else {
                    return Ok(0);
                };
                if let Err(e) = part.append(data) {
                    *storage_error.borrow_mut() = Some(e);
                    return Ok(0);
                }
                permit.commit(part.len());
                if last_report.elapsed() >= interval {
                    sink.on_progress(part.len());
                    last_report = Instant::now();
                }
                Ok(data.len())
            })
            .map_err(TransferError::Curl)?;
        // Also called while the connection is idle, so cancel is seen on a stalled link.
        transfer
            .progress_function(|_, _, _, _| !control.is_cancelled())
            .map_err(TransferError::Curl)?;
        transfer.perform()
    };

    if control.is_cancelled() {
        tracing::debug!(url = %request.url, "transfer cancelled");
        return Err(TransferError::Cancelled);
    }
    if let Some(e) = storage_error.into_inner() {
        return Err(TransferError::Storage(e));
    }
    if let Err(e) = result {
        if e.is_http_returned_error() {
            let code = easy.response_code().map_err(TransferError::Curl)?;
            return Err(TransferError::Http(code));
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code().map_err(TransferError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    let headers = headers.into_inner();
    let received = part.len();
    if let Some(expected) = headers.content_length {
        if expected != received {
            return Err(TransferError::Incomplete { expected, received });
        }
    }
    part.sync().map_err(TransferError::Storage)?;
    sink.on_progress(received);
    tracing::debug!(url = %request.url, bytes = received, "transfer finished");
    Ok(headers)
}

fn configure(easy: &mut Easy, request: &TransferRequest) -> Result<(), curl::Error> {
    let opts = &request.options;
    easy.url(&request.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    // Error statuses fail before any body reaches the part file.
    easy.fail_on_error(true)?;
    easy.useragent(&opts.user_agent)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // No low-speed limit: a paused transfer reads nothing for as long as the user wants.
    if let Some(timeout) = opts.timeout {
        easy.timeout(timeout)?;
    }
    if let Some(size) = opts.buffer_size {
        easy.buffer_size(size)?;
    }
    if let Some(speed) = opts.max_recv_speed {
        easy.max_recv_speed(speed)?;
    }
    easy.progress(true)?;
    Ok(())
}
