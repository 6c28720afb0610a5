//! Job snapshots: one fetched view of a job's status and queue metadata.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::api::{self, JobPayload};
use crate::error::{ClientError, ClientResult};
use crate::status::JobStatus;
use crate::transport::{ApiRequest, Requester};

/// One fetched representation of a job.
///
/// Fields the server did not send are `None`, never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub queue_position: Option<u64>,
    pub etd_seconds: Option<f64>,
    pub queue_last_update: Option<String>,
    pub circuit: Option<Value>,
    pub nshots: Option<u64>,
    pub device: Option<String>,
    pub project: Option<String>,
}

impl JobSnapshot {
    /// Snapshot carrying only a status.
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            queue_position: None,
            etd_seconds: None,
            queue_last_update: None,
            circuit: None,
            nshots: None,
            device: None,
            project: None,
        }
    }

    /// Parse a job payload.
    ///
    /// The device name is taken from `projectquota.partition.name` when
    /// present, otherwise from `device`.
    pub fn from_json(body: Value) -> ClientResult<Self> {
        let payload: JobPayload = serde_json::from_value(body)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid job payload: {e}")))?;
        Ok(Self::from(payload))
    }

    /// Whether the queue position or ETA is known.
    pub fn has_queue_info(&self) -> bool {
        self.queue_position.is_some() || self.etd_seconds.is_some()
    }
}

impl From<JobPayload> for JobSnapshot {
    fn from(payload: JobPayload) -> Self {
        let partition_name = payload
            .projectquota
            .as_ref()
            .and_then(|pq| pq.partition.as_ref())
            .and_then(|p| p.name.clone());
        let device = partition_name.or_else(|| {
            payload
                .device
                .as_ref()
                .and_then(|d| d.name())
                .map(str::to_string)
        });

        Self {
            status: JobStatus::parse(&payload.status),
            queue_position: payload.queue_position,
            etd_seconds: payload.etd_seconds,
            queue_last_update: payload.queue_last_update,
            circuit: payload.circuit,
            nshots: payload.nshots,
            device,
            project: payload.projectquota.and_then(|pq| pq.project),
        }
    }
}

/// Fetch the current snapshot of job `pid`.
#[instrument(skip(requester, headers))]
pub fn fetch_snapshot(
    requester: &Requester,
    base_url: &str,
    headers: &[(String, String)],
    pid: &str,
) -> ClientResult<JobSnapshot> {
    let request = ApiRequest::get(api::job_url(base_url, pid)).with_headers(headers);
    let body = requester.json(request, api::JOB_REQUIRED_KEYS)?;
    let snapshot = JobSnapshot::from_json(body)?;
    debug!(status = %snapshot.status, "fetched job snapshot");
    Ok(snapshot)
}
