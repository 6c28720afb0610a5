//! Shared fixtures for integration tests: a scripted transport, a recording
//! sleeper, archive builders and log capture.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use ndarray::ArrayD;
use qcloud_client::{
    ApiRequest, Client, ClientConfig, Method, RawResponse, Sleeper, Transport, TransportFailure,
};
use serde_json::{Value, json};
use tracing_subscriber::filter::LevelFilter;

pub const BASE_URL: &str = "https://cloud.test";
pub const TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, Vec<u8>),
    NetworkError(String),
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Reply::Status(status, body.to_string().into_bytes())
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Reply::Status(status, body.into())
    }
}

/// In-memory server answering each (method, path) from a queue of replies.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `replies` for `method path`, in order.
    pub fn script(&self, method: Method, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .extend(replies);
    }

    /// Queue one status payload per entry for `GET /jobs/{pid}/`.
    pub fn script_statuses(&self, pid: &str, statuses: &[&str]) {
        self.script(
            Method::Get,
            &format!("/jobs/{pid}/"),
            statuses.iter().map(|s| Reply::json(200, json!({"status": s}))),
        );
    }

    pub fn script_download(&self, pid: &str, body: Vec<u8>) {
        self.script(
            Method::Get,
            &format!("/jobs/{pid}/download/"),
            [Reply::bytes(200, body)],
        );
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        let url = format!("{BASE_URL}{path}");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request.clone());

        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&(request.method, path.clone()))
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Status(status, body)) => Ok(RawResponse::from_bytes(status, body)),
            Some(Reply::NetworkError(message)) => Err(TransportFailure(message)),
            None => Ok(RawResponse::from_bytes(
                599,
                format!("unscripted request {} {path}", request.method),
            )),
        }
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    calls: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.borrow_mut().push(duration);
    }
}

/// Client over `transport`, storing results under `results_base`.
pub fn client(transport: &Arc<ScriptedTransport>, results_base: &Path) -> Client {
    let config = ClientConfig::default()
        .with_base_url(BASE_URL)
        .with_token(TOKEN)
        .with_results_base_dir(results_base)
        .with_poll_interval(Duration::from_millis(10));
    Client::with_transport(config, transport.clone()).unwrap()
}

/// Gzip tar archive holding `members`.
pub fn tar_gz(members: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// `.npy` encoding of `array`.
pub fn npy_bytes(array: &ArrayD<f64>) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.npy");
    ndarray_npy::write_npy(&path, array).unwrap();
    std::fs::read(path).unwrap()
}

/// Collects formatted log output.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Run `f` with every log event written to this capture.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(false)
            .with_max_level(LevelFilter::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Log lines that end with `suffix`.
    pub fn lines_ending_with(&self, suffix: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.trim_end().ends_with(suffix))
            .count()
    }
}
