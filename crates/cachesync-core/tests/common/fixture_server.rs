//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed map of path -> body. Unknown paths get 404. Every GET is
//! counted and the last `Accept` header per path is recorded. With a
//! `chunk_delay` the body is written in small pieces so a transfer can be
//! interrupted while in flight.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureOptions {
    /// Sleep between body chunks (slow server).
    pub chunk_delay: Option<Duration>,
    pub chunk_size: usize,
}

#[derive(Default)]
struct Shared {
    files: HashMap<String, Vec<u8>>,
    gets: AtomicUsize,
    accepts: Mutex<HashMap<String, String>>,
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct FixtureServer {
    base: String,
    shared: Arc<Shared>,
}

impl FixtureServer {
    /// URL for `path` (no leading slash), e.g. `url("packs/a.bin")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Number of GET requests served so far (including 404s).
    pub fn get_count(&self) -> usize {
        self.shared.gets.load(Ordering::SeqCst)
    }

    pub fn last_accept(&self, path: &str) -> Option<String> {
        self.shared
            .accepts
            .lock()
            .unwrap()
            .get(&format!("/{}", path))
            .cloned()
    }
}

pub fn start(files: Vec<(&str, Vec<u8>)>) -> FixtureServer {
    start_with_options(files, FixtureOptions::default())
}

pub fn start_with_options(files: Vec<(&str, Vec<u8>)>, opts: FixtureOptions) -> FixtureServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let shared = Arc::new(Shared {
        files: files
            .into_iter()
            .map(|(path, body)| (format!("/{}", path.trim_start_matches('/')), body))
            .collect(),
        ..Shared::default()
    });
    let server_shared = Arc::clone(&shared);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&server_shared);
            thread::spawn(move || handle(stream, &shared, opts));
        }
    });
    FixtureServer {
        base: format!("http://127.0.0.1:{}/", port),
        shared,
    }
}

fn handle(mut stream: TcpStream, shared: &Shared, opts: FixtureOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path, accept) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    shared.gets.fetch_add(1, Ordering::SeqCst);
    if let Some(accept) = accept {
        shared
            .accepts
            .lock()
            .unwrap()
            .insert(path.to_string(), accept.to_string());
    }
    let Some(body) = shared.files.get(path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
        body.len()
    );
    if stream.write_all(header.as_bytes()).is_err() {
        return;
    }
    match opts.chunk_delay {
        None => {
            let _ = stream.write_all(body);
        }
        Some(delay) => {
            for chunk in body.chunks(opts.chunk_size.max(1)) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(delay);
            }
        }
    }
}

/// Returns (method, path, Accept header value).
fn parse_request(request: &str) -> (&str, &str, Option<&str>) {
    let mut method = "";
    let mut path = "";
    let mut accept = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            let mut parts = line.split_whitespace();
            method = parts.next().unwrap_or("");
            path = parts.next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("accept") {
                accept = Some(value.trim());
            }
        }
    }
    (method, path, accept)
}
