//! Integration tests for `transfer::fetch` on its own, without a coordinator.

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::archive_server::{self, ArchiveServerOptions};
use draftbox_core::control::TransferControl;
use draftbox_core::storage::part_path;
use draftbox_core::transfer::{fetch, ProgressSink, TransferError, TransferOptions, TransferRequest};
use draftbox_core::TaskId;
use tempfile::tempdir;

#[derive(Default)]
struct Recorder {
    total: Mutex<Option<Option<u64>>>,
    progress: Mutex<Vec<u64>>,
}

impl ProgressSink for Recorder {
    fn on_headers(&self, bytes_total: Option<u64>) {
        *self.total.lock().unwrap() = Some(bytes_total);
    }

    fn on_progress(&self, bytes_done: u64) {
        self.progress.lock().unwrap().push(bytes_done);
    }
}

fn request(base: &str, dest: &std::path::Path, id: &str) -> TransferRequest {
    TransferRequest {
        url: format!("{base}drafts/{id}/archive"),
        part_path: part_path(dest, &TaskId::parse(id).unwrap(), 1),
        options: TransferOptions {
            progress_interval: Duration::from_millis(10),
            ..Default::default()
        },
    }
}

#[test]
fn fetch_streams_into_part_file() {
    let body = common::body(200_000);
    let server = archive_server::start_with_options(
        body.clone(),
        ArchiveServerOptions {
            content_disposition: Some("attachment; filename=draft.zip".into()),
            ..Default::default()
        },
    );
    let dest = tempdir().unwrap();
    let req = request(&server.base, dest.path(), "x1");
    let sink = Recorder::default();

    let fetched = fetch(&req, &TransferControl::new(), &sink).unwrap();
    assert_eq!(fetched.bytes, body.len() as u64);
    assert_eq!(
        fetched.content_disposition.as_deref(),
        Some("attachment; filename=draft.zip")
    );
    assert_eq!(fetched.part.temp_path(), req.part_path);
    assert_eq!(*sink.total.lock().unwrap(), Some(Some(body.len() as u64)));
    let progress = sink.progress.lock().unwrap().clone();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&(body.len() as u64)));

    let final_path = dest.path().join("draft.zip");
    fetched.part.finalize(&final_path).unwrap();
    assert_eq!(std::fs::read(final_path).unwrap(), body);
    assert!(!req.part_path.exists());
}

#[test]
fn cancel_while_paused_removes_part_file() {
    let server = archive_server::start_with_options(
        common::body(1024 * 1024),
        ArchiveServerOptions {
            chunk_size: 4 * 1024,
            chunk_delay: Duration::from_millis(10),
            ..Default::default()
        },
    );
    let dest = tempdir().unwrap();
    let req = request(&server.base, dest.path(), "x2");
    let control = Arc::new(TransferControl::new());
    let sink = Arc::new(Recorder::default());

    let worker = {
        let (req, control, sink) = (req.clone(), Arc::clone(&control), Arc::clone(&sink));
        thread::spawn(move || fetch(&req, &control, sink.as_ref()).map(|f| f.bytes))
    };

    assert!(common::wait_for(Duration::from_secs(10), || {
        sink.progress.lock().unwrap().last().is_some_and(|&n| n > 0)
    }));
    let written = control.pause();
    assert!(written > 0);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(control.written(), written);
    assert!(req.part_path.exists());
    control.cancel();

    let result = worker.join().unwrap();
    assert!(matches!(result, Err(TransferError::Cancelled)));
    assert!(!req.part_path.exists());
}

#[test]
fn server_error_leaves_no_part_file() {
    let server = archive_server::start_with_options(
        common::body(10),
        ArchiveServerOptions {
            status: 503,
            ..Default::default()
        },
    );
    let dest = tempdir().unwrap();
    let req = request(&server.base, dest.path(), "x3");
    let err = fetch(&req, &TransferControl::new(), &Recorder::default()).unwrap_err();
    assert!(matches!(err, TransferError::Http(503)), "{err:?}");
    assert!(!req.part_path.exists());
}
