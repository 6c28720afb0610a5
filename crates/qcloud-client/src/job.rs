//! Job handles.
//!
//! A [`Job`] is the client-side view of one remote computation. Its status
//! fields are only ever written by [`Job::apply_snapshot`], which replaces
//! them as a group from one server payload.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use console::Term;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{self, DeleteResponse};
use crate::archive::{ArchivePipeline, RESULTS_FILE, UnpackOutcome};
use crate::config::JobSettings;
use crate::error::ClientResult;
use crate::poll::{Poller, Sleeper, StatusObserver, ThreadSleeper};
use crate::render::{LogObserver, SilentObserver, SpinnerObserver};
use crate::result::JobResult;
use crate::snapshot::{JobSnapshot, fetch_snapshot};
use crate::status::JobStatus;
use crate::transport::{ApiRequest, Requester};

/// How [`Job::result`] waits for completion.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    /// Time between status checks; the configured interval when `None`.
    pub interval: Option<Duration>,
    /// Report status changes. Silent when `false`.
    pub verbose: bool,
    /// Use a terminal spinner when stderr is a terminal.
    pub interactive: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: None,
            verbose: false,
            interactive: true,
        }
    }
}

impl WaitOptions {
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// How progress is reported, given whether stderr is a terminal.
    pub fn observer_kind(&self, is_term: bool) -> ObserverKind {
        if !self.verbose {
            ObserverKind::Silent
        } else if self.interactive && is_term {
            ObserverKind::Spinner
        } else {
            ObserverKind::Log
        }
    }
}

/// Progress reporting chosen by [`WaitOptions::observer_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    /// No per-status output.
    Silent,
    /// Live terminal spinner.
    Spinner,
    /// One log line per status change.
    Log,
}

impl ObserverKind {
    pub fn observer(self, pid: &str, device: Option<&str>) -> Box<dyn StatusObserver> {
        match self {
            Self::Silent => Box::new(SilentObserver),
            Self::Spinner => Box::new(SpinnerObserver::new(pid, device.map(str::to_string))),
            Self::Log => Box::new(LogObserver::new()),
        }
    }
}

/// One remote computation.
pub struct Job {
    pid: String,
    base_url: String,
    headers: Vec<(String, String)>,
    requester: Requester,
    settings: JobSettings,
    circuit: Option<Value>,
    nshots: Option<u64>,
    device: Option<String>,
    project: Option<String>,
    status: Option<JobStatus>,
    queue_position: Option<u64>,
    etd_seconds: Option<f64>,
    queue_last_update: Option<String>,
    results_folder: Option<PathBuf>,
    results_path: Option<PathBuf>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("pid", &self.pid)
            .field("base_url", &self.base_url)
            .field("headers", &"[REDACTED]")
            .field("device", &self.device)
            .field("project", &self.project)
            .field("nshots", &self.nshots)
            .field("status", &self.status)
            .field("queue_position", &self.queue_position)
            .field("etd_seconds", &self.etd_seconds)
            .field("results_path", &self.results_path)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub(crate) fn new(
        pid: impl Into<String>,
        base_url: impl Into<String>,
        headers: Vec<(String, String)>,
        requester: Requester,
        settings: JobSettings,
    ) -> Self {
        Self {
            pid: pid.into(),
            base_url: base_url.into(),
            headers,
            requester,
            settings,
            circuit: None,
            nshots: None,
            device: None,
            project: None,
            status: None,
            queue_position: None,
            etd_seconds: None,
            queue_last_update: None,
            results_folder: None,
            results_path: None,
        }
    }

    /// Record what was submitted.
    pub(crate) fn with_submission(
        mut self,
        circuit: &str,
        device: &str,
        nshots: Option<u64>,
        project: Option<&str>,
    ) -> Self {
        self.circuit = Some(Value::String(circuit.to_string()));
        self.device = Some(device.to_string());
        self.nshots = nshots;
        self.project = project.map(str::to_string);
        self
    }

    /// Server-assigned identifier.
    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn circuit(&self) -> Option<&Value> {
        self.circuit.as_ref()
    }

    pub fn nshots(&self) -> Option<u64> {
        self.nshots
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Last known status, `None` before the first fetch.
    pub fn cached_status(&self) -> Option<&JobStatus> {
        self.status.as_ref()
    }

    pub fn queue_position(&self) -> Option<u64> {
        self.queue_position
    }

    /// Estimated seconds until the job starts.
    pub fn etd_seconds(&self) -> Option<f64> {
        self.etd_seconds
    }

    pub fn queue_last_update(&self) -> Option<&str> {
        self.queue_last_update.as_deref()
    }

    /// `<results_base>/<pid>/`, once [`Job::result`] has run.
    pub fn results_folder(&self) -> Option<&Path> {
        self.results_folder.as_deref()
    }

    /// Path of `results.npy`, once a successful result has been retrieved.
    pub fn results_path(&self) -> Option<&Path> {
        self.results_path.as_deref()
    }

    /// Where this job's results are unpacked.
    pub fn results_dir(&self) -> PathBuf {
        self.settings.results_base_dir.join(&self.pid)
    }

    /// Replace the status fields with those of `snapshot`.
    ///
    /// Descriptive fields (circuit, shots, device, project) are only
    /// overwritten when the snapshot carries them.
    pub fn apply_snapshot(&mut self, snapshot: &JobSnapshot) {
        self.status = Some(snapshot.status.clone());
        self.queue_position = snapshot.queue_position;
        self.etd_seconds = snapshot.etd_seconds;
        self.queue_last_update = snapshot.queue_last_update.clone();

        if let Some(circuit) = &snapshot.circuit {
            self.circuit = Some(circuit.clone());
        }
        if let Some(nshots) = snapshot.nshots {
            self.nshots = Some(nshots);
        }
        if let Some(device) = &snapshot.device {
            self.device = Some(device.clone());
        }
        if let Some(project) = &snapshot.project {
            self.project = Some(project.clone());
        }
    }

    /// Fetch the current snapshot and apply it.
    pub fn refresh(&mut self) -> ClientResult<()> {
        let snapshot = fetch_snapshot(&self.requester, &self.base_url, &self.headers, &self.pid)?;
        self.apply_snapshot(&snapshot);
        Ok(())
    }

    /// Fetch and return the current status.
    pub fn status(&mut self) -> ClientResult<JobStatus> {
        self.refresh()?;
        Ok(self.status.clone().unwrap_or(JobStatus::Unknown(String::new())))
    }

    /// Whether the job is running, fetching only if no status is known yet.
    pub fn running(&mut self) -> ClientResult<bool> {
        Ok(self.known_status()? == JobStatus::Running)
    }

    /// Whether the job succeeded, fetching only if no status is known yet.
    pub fn success(&mut self) -> ClientResult<bool> {
        Ok(self.known_status()? == JobStatus::Success)
    }

    fn known_status(&mut self) -> ClientResult<JobStatus> {
        match &self.status {
            Some(status) => Ok(status.clone()),
            None => self.status(),
        }
    }

    /// Delete the job on the server, returning the confirmation message.
    #[instrument(skip(self), fields(pid = %self.pid))]
    pub fn delete(&self) -> ClientResult<String> {
        delete_job(&self.requester, &self.base_url, &self.headers, &self.pid)
    }

    /// Wait for the job to finish and retrieve its result.
    ///
    /// Returns `Ok(None)` when the job ended in ERROR (its logs are reported)
    /// or when the download could not be unpacked.
    pub fn result(&mut self, options: &WaitOptions) -> ClientResult<Option<JobResult>> {
        let interval = options.interval.unwrap_or(self.settings.poll_interval);
        let kind = options.observer_kind(Term::stderr().is_term());
        debug!(pid = %self.pid, ?kind, "waiting for job to complete");
        let mut observer = kind.observer(&self.pid, self.device.as_deref());

        if kind == ObserverKind::Silent {
            info!("Please wait until your job is completed...");
        }
        self.result_with(observer.as_mut(), &ThreadSleeper, interval)
    }

    /// [`Job::result`] with an explicit observer and sleeper.
    #[instrument(skip(self, observer, sleeper), fields(pid = %self.pid))]
    pub fn result_with(
        &mut self,
        observer: &mut dyn StatusObserver,
        sleeper: &dyn Sleeper,
        interval: Duration,
    ) -> ClientResult<Option<JobResult>> {
        let pipeline = ArchivePipeline::new(self.results_dir());

        if let Some(cached) = self.cached_result(&pipeline) {
            return Ok(Some(cached));
        }

        let requester = self.requester.clone();
        let poller =
            Poller::new(&requester, sleeper).with_max_unknown_polls(self.settings.max_unknown_polls);
        let (download, terminal) = poller.wait(self, interval, observer)?;

        let outcome = pipeline.unpack(download.into_reader())?;
        self.results_folder = Some(pipeline.results_folder().to_path_buf());
        if let UnpackOutcome::Corrupt { .. } = outcome {
            return Ok(None);
        }

        match terminal {
            JobStatus::Success => {
                let path = pipeline.member(RESULTS_FILE);
                self.results_path = Some(path);
                match pipeline.load_result() {
                    Ok(result) => Ok(Some(result)),
                    Err(e) => {
                        error!("Job succeeded but its result could not be loaded: {e}");
                        Ok(None)
                    }
                }
            }
            JobStatus::Error => {
                pipeline.report_job_error();
                Ok(None)
            }
            other => {
                warn!("polling stopped on non-terminal status {other}");
                Ok(None)
            }
        }
    }

    /// Previously downloaded result, if the job is known to have succeeded.
    fn cached_result(&mut self, pipeline: &ArchivePipeline) -> Option<JobResult> {
        if self.status != Some(JobStatus::Success) {
            return None;
        }
        let path = pipeline.member(RESULTS_FILE);
        if !path.is_file() {
            return None;
        }
        match JobResult::load(&path) {
            Ok(result) => {
                info!("Loading cached result from {}", path.display());
                self.results_folder = Some(pipeline.results_folder().to_path_buf());
                self.results_path = Some(path);
                Some(result)
            }
            Err(e) => {
                warn!("cached result is unreadable, downloading again: {e}");
                None
            }
        }
    }
}

fn delete_job(
    requester: &Requester,
    base_url: &str,
    headers: &[(String, String)],
    pid: &str,
) -> ClientResult<String> {
    let request = ApiRequest::delete(api::job_url(base_url, pid)).with_headers(headers);
    let response = requester.send(request)?;
    let text = response.text()?;
    let detail = serde_json::from_str::<DeleteResponse>(&text)
        .ok()
        .and_then(|r| r.detail)
        .unwrap_or_default();
    info!("Job {pid} deleted: {detail}");
    Ok(detail)
}
