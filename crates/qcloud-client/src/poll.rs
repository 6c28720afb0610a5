//! Polling a job until it reaches a terminal state.
//!
//! ```text
//!   loop:
//!     fetch snapshot ──→ apply to job ──→ observer.observe
//!        │
//!        ├── terminal? ──→ observer.finish ──→ GET download ──→ return
//!        └── otherwise ──→ sleep(interval)
//! ```
//!
//! The interval is fixed: no backoff and no sleep after the terminal fetch.
//! There is no overall timeout; the caller interrupts the process to cancel.

use std::time::Duration;

use tracing::{debug, warn};

use crate::api;
use crate::error::{ClientError, ClientResult};
use crate::job::Job;
use crate::snapshot::fetch_snapshot;
use crate::status::JobStatus;
use crate::transport::{ApiRequest, RawResponse, Requester};

/// Default limit of consecutive unrecognized statuses.
pub const DEFAULT_MAX_UNKNOWN_POLLS: u32 = 30;

/// Blocks the caller between two status checks.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Receives every status observation made while polling.
pub trait StatusObserver {
    /// Called once per fetched snapshot, terminal ones included.
    fn observe(&mut self, status: &JobStatus, queue_position: Option<u64>, etd_seconds: Option<f64>);

    /// Called once with the terminal status, before the download starts.
    fn finish(&mut self, _status: &JobStatus) {}
}

/// Drives the status-check loop for one job.
pub struct Poller<'a> {
    requester: &'a Requester,
    sleeper: &'a dyn Sleeper,
    max_unknown_polls: u32,
}

impl<'a> Poller<'a> {
    pub fn new(requester: &'a Requester, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            requester,
            sleeper,
            max_unknown_polls: DEFAULT_MAX_UNKNOWN_POLLS,
        }
    }

    /// Give up after `limit` consecutive unrecognized statuses. `0` means
    /// never give up.
    pub fn with_max_unknown_polls(mut self, limit: u32) -> Self {
        self.max_unknown_polls = limit;
        self
    }

    /// Poll `job` every `interval` until it is terminal, then request the
    /// result archive.
    ///
    /// Returns the download response (body not yet consumed) and the terminal
    /// status.
    pub fn wait(
        &self,
        job: &mut Job,
        interval: Duration,
        observer: &mut dyn StatusObserver,
    ) -> ClientResult<(RawResponse, JobStatus)> {
        let mut unknown_streak = 0u32;
        let mut fetches = 0u64;

        loop {
            let snapshot = fetch_snapshot(self.requester, job.base_url(), job.headers(), job.pid())?;
            fetches += 1;
            job.apply_snapshot(&snapshot);
            observer.observe(&snapshot.status, snapshot.queue_position, snapshot.etd_seconds);

            if snapshot.status.is_terminal() {
                observer.finish(&snapshot.status);
                debug!(pid = job.pid(), fetches, "job reached {}", snapshot.status);
                let request = ApiRequest::get(api::download_url(job.base_url(), job.pid()))
                    .with_headers(job.headers());
                let response = self.requester.send(request)?;
                return Ok((response, snapshot.status));
            }

            if let JobStatus::Unknown(raw) = &snapshot.status {
                unknown_streak += 1;
                warn!(pid = job.pid(), "server reported unrecognized job status '{raw}'");
                if self.max_unknown_polls > 0 && unknown_streak >= self.max_unknown_polls {
                    return Err(ClientError::UnknownStatus(raw.clone()));
                }
            } else {
                unknown_streak = 0;
            }

            self.sleeper.sleep(interval);
        }
    }
}
