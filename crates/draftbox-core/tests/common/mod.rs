#![allow(dead_code)]

pub mod archive_server;

use std::time::{Duration, Instant};

use draftbox_core::source::TemplateSource;
use draftbox_core::{CoordinatorOptions, DownloadCoordinator, TaskEvent, TaskSubscription};

/// Deterministic archive body of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0u8..251).cycle().take(len).collect()
}

/// Coordinator whose archive URLs point at `base` (as returned by `archive_server::start`).
pub fn coordinator(base: &str) -> DownloadCoordinator {
    coordinator_with_capacity(base, CoordinatorOptions::default().event_capacity)
}

/// Like `coordinator`, with `event_capacity` events buffered per subscriber.
pub fn coordinator_with_capacity(base: &str, event_capacity: usize) -> DownloadCoordinator {
    let source = TemplateSource::new(format!("{base}drafts/{{id}}/archive")).unwrap();
    let mut options = CoordinatorOptions {
        event_capacity,
        ..Default::default()
    };
    options.transfer.progress_interval = Duration::from_millis(20);
    DownloadCoordinator::new(source, options)
}

/// Next event for the subscription, failing the test after `timeout`.
pub fn next_event(sub: &mut TaskSubscription, timeout: Duration) -> TaskEvent {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(event) = sub.try_recv() {
            return event;
        }
        assert!(Instant::now() < deadline, "timed out waiting for event");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Collects events up to and including `Released`.
pub fn events_until_released(sub: &mut TaskSubscription, timeout: Duration) -> Vec<TaskEvent> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let event = next_event(sub, left.max(Duration::from_millis(1)));
        let done = matches!(event, TaskEvent::Released { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Polls `check` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}
