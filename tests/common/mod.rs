//! Shared fakes for integration tests.

#![allow(dead_code)]

use holeguard::{Clock, Error, FeedSource, Result, SnapshotRecord, Timestamp};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub const MINUTE: u64 = 60 * 1000;
pub const HOUR: u64 = 60 * MINUTE;
/// 2025-06-01T00:00:00Z
pub const T0: u64 = 1_748_736_000_000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn at(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn record(id: u64, domain: &str) -> SnapshotRecord {
    SnapshotRecord {
        id,
        domain: domain.to_string(),
        insert_date: Some("2025-01-01T00:00:00".to_string()),
        delete_date: None,
    }
}

pub fn deleted(id: u64, domain: &str) -> SnapshotRecord {
    SnapshotRecord {
        delete_date: Some("2025-02-01T00:00:00".to_string()),
        ..record(id, domain)
    }
}

pub fn log_line(id: u64, domain: &str, action: &str) -> String {
    format!(
        "{{\"RegisterPositionId\":{},\"DomainAddress\":\"{}\",\"ActionType\":\"{}\"}}",
        id, domain, action
    )
}

/// Log tail as a range request would return it: a cut-off first line, then `lines`.
pub fn log_tail(lines: &[String]) -> String {
    let mut text = String::from("Address\":\"cut.example\",\"ActionType\":\"block\"}\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Feed answering from queues; an empty queue is a transport error.
#[derive(Default)]
pub struct QueueFeed {
    snapshots: Mutex<VecDeque<Vec<SnapshotRecord>>>,
    logs: Mutex<VecDeque<String>>,
    pub snapshot_calls: AtomicUsize,
    pub log_calls: AtomicUsize,
}

impl QueueFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_snapshot(&self, records: Vec<SnapshotRecord>) {
        self.snapshots.lock().push_back(records);
    }

    pub fn push_log(&self, text: String) {
        self.logs.lock().push_back(text);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }
}

impl FeedSource for QueueFeed {
    fn fetch_snapshot(&self) -> Result<Vec<SnapshotRecord>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Transport("snapshot unavailable".into()))
    }

    fn fetch_action_log_tail(&self, _year: i32, _max_bytes: u64) -> Result<String> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.logs
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Transport("log unavailable".into()))
    }
}

/// Minimal HTTP/1.1 server serving a snapshot and an action log.
///
/// Honors suffix `Range: bytes=-N` headers and records every Range it sees.
pub struct FeedServer {
    pub base_url: String,
    pub ranges: Arc<Mutex<Vec<String>>>,
    snapshot: Arc<Mutex<String>>,
    log: Arc<Mutex<String>>,
    status: Arc<Mutex<Option<u16>>>,
}

impl FeedServer {
    pub fn start(snapshot: &str, log: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let snapshot = Arc::new(Mutex::new(snapshot.to_string()));
        let log = Arc::new(Mutex::new(log.to_string()));
        let status = Arc::new(Mutex::new(None));

        let (r, s, l, st) = (ranges.clone(), snapshot.clone(), log.clone(), status.clone());
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let path = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let mut range = None;
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap_or(0) == 0 {
                        break;
                    }
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("range") {
                            range = Some(value.trim().to_string());
                        }
                    }
                }

                let forced = *st.lock();
                let response = if let Some(code) = forced {
                    respond(code, &[], b"unavailable")
                } else if path.ends_with("domains.json") {
                    respond(200, &[], s.lock().as_bytes())
                } else if path.contains("actions_") {
                    let body = l.lock().clone().into_bytes();
                    match range.as_deref().and_then(|r| r.strip_prefix("bytes=-")) {
                        Some(n) => {
                            r.lock().push(range.clone().unwrap());
                            let n: usize = n.parse().unwrap();
                            let start = body.len().saturating_sub(n);
                            let content_range = format!(
                                "Content-Range: bytes {}-{}/{}",
                                start,
                                body.len().saturating_sub(1),
                                body.len()
                            );
                            respond(206, &[content_range], &body[start..])
                        }
                        None => respond(200, &[], &body),
                    }
                } else {
                    respond(404, &[], b"not found")
                };
                let _ = stream.write_all(&response);
            }
        });

        Self {
            base_url,
            ranges,
            snapshot,
            log,
            status,
        }
    }

    /// Answer every request with `status` until cleared with `None`.
    pub fn set_status(&self, status: Option<u16>) {
        *self.status.lock() = status;
    }

    pub fn set_log(&self, log: &str) {
        *self.log.lock() = log.to_string();
    }

    pub fn set_snapshot(&self, snapshot: &str) {
        *self.snapshot.lock() = snapshot.to_string();
    }
}

fn respond(status: u16, headers: &[String], body: &[u8]) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        _ => "Error",
    };
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason,
        body.len()
    );
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}
