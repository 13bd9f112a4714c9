//! Minimal HTTP/1.1 server handing out draft archives for integration tests.
//!
//! Every GET gets the same body, streamed in chunks with an optional delay so
//! tests can pause or cancel mid-transfer. Writes have no timeout: a client
//! that stops reading simply holds the connection open.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ArchiveServerOptions {
    /// Response status; anything but 2xx is sent with a short text body.
    pub status: u16,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub content_disposition: Option<String>,
    /// Send no Content-Length and close the connection after the body.
    pub omit_content_length: bool,
    /// Announce the full length but hang up after this many body bytes.
    pub truncate_at: Option<usize>,
}

impl Default for ArchiveServerOptions {
    fn default() -> Self {
        Self {
            status: 200,
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
            content_disposition: None,
            omit_content_length: false,
            truncate_at: None,
        }
    }
}

/// Handle to a running server.
pub struct ArchiveServer {
    /// Base URL ending in `/`, e.g. "http://127.0.0.1:12345/".
    pub base: String,
    requests: Arc<AtomicUsize>,
}

impl ArchiveServer {
    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> ArchiveServer {
    start_with_options(body, ArchiveServerOptions::default())
}

/// Starts the server on a background thread. It runs until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: ArchiveServerOptions) -> ArchiveServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = Arc::clone(&body);
            let opts = opts.clone();
            thread::spawn(move || handle(stream, &body, &opts));
        }
    });
    ArchiveServer {
        base: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

/// A port with nothing listening on it.
pub fn closed_port_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, body: &[u8], opts: &ArchiveServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    if !(path.starts_with("/drafts/") && path.ends_with("/archive")) {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found");
        return;
    }
    if !(200..300).contains(&opts.status) {
        let text = format!("error {}", opts.status);
        let response = format!(
            "HTTP/1.1 {} Error\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            opts.status,
            text.len(),
            text
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let mut head = format!("HTTP/1.1 {} OK\r\nContent-Type: application/zip\r\n", opts.status);
    if !opts.omit_content_length {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    if let Some(cd) = &opts.content_disposition {
        head.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }
    head.push_str("Connection: close\r\n\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }

    let limit = opts.truncate_at.unwrap_or(body.len()).min(body.len());
    for chunk in body[..limit].chunks(opts.chunk_size.max(1)) {
        if stream.write_all(chunk).is_err() {
            return;
        }
        if !opts.chunk_delay.is_zero() {
            thread::sleep(opts.chunk_delay);
        }
    }
    let _ = stream.flush();
}
