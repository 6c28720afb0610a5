//! Client façade: submission, job handles, deletion and listings.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::{self, JobInfo, QuotaInfo, SubmitRequest, SubmitResponse};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::job::Job;
use crate::render::{format_timestamp, render_table};
use crate::transport::{ApiRequest, HttpTransport, Requester, Transport};

/// Options for [`Client::run_circuit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Project whose quota is charged; the server default when `None`.
    pub project: Option<String>,
    /// Number of shots; the server default when `None`.
    pub nshots: Option<u64>,
    /// Run the circuit without transpilation.
    pub verbatim: bool,
}

impl SubmitOptions {
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_shots(mut self, nshots: u64) -> Self {
        self.nshots = Some(nshots);
        self
    }

    pub fn verbatim(mut self, verbatim: bool) -> Self {
        self.verbatim = verbatim;
        self
    }
}

/// Authenticated connection to the job server.
pub struct Client {
    config: ClientConfig,
    base_url: String,
    headers: Vec<(String, String)>,
    requester: Requester,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("results_base_dir", &self.config.results_base_dir)
            .finish()
    }
}

impl Client {
    /// Create a client that talks HTTP.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.request_timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::MissingToken)?;

        Ok(Self {
            base_url: config.normalized_base_url(),
            headers: api::auth_headers(token),
            requester: Requester::new(transport),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Handle for an existing job, without contacting the server.
    ///
    /// Fails with [`ClientError::Config`] when `pid` is not a single plain
    /// path segment.
    pub fn job(&self, pid: impl Into<String>) -> ClientResult<Job> {
        let pid = pid.into();
        if !api::is_valid_pid(&pid) {
            return Err(ClientError::Config(format!("invalid job pid {pid:?}")));
        }
        Ok(self.job_unchecked(pid))
    }

    fn job_unchecked(&self, pid: String) -> Job {
        Job::new(
            pid,
            self.base_url.clone(),
            self.headers.clone(),
            self.requester.clone(),
            self.config.job_settings(),
        )
    }

    /// Submit a circuit for execution on `device`.
    #[instrument(skip(self, circuit))]
    pub fn run_circuit(&self, circuit: &str, device: &str, options: &SubmitOptions) -> ClientResult<Job> {
        let body = serde_json::to_value(SubmitRequest {
            circuit,
            device,
            project: options.project.as_deref(),
            nshots: options.nshots,
            verbatim: options.verbatim,
        })?;
        let request = ApiRequest::post(api::jobs_url(&self.base_url), body).with_headers(&self.headers);
        let response: SubmitResponse = serde_json::from_value(self.requester.json(request, &[])?)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid submission response: {e}")))?;

        let Some(pid) = response.pid.as_deref().filter(|p| !p.is_empty()).map(str::to_string) else {
            return Err(ClientError::JobPostFailed(response.failure_detail()));
        };
        if !api::is_valid_pid(&pid) {
            return Err(ClientError::MalformedResponse(format!(
                "server assigned an invalid job pid {pid:?}"
            )));
        }

        info!("Job posted on server with pid {pid}");
        Ok(self
            .job_unchecked(pid)
            .with_submission(circuit, device, options.nshots, options.project.as_deref()))
    }

    /// Handle for an existing job, refreshed from the server.
    #[instrument(skip(self))]
    pub fn get_job(&self, pid: &str) -> ClientResult<Job> {
        let mut job = self.job(pid)?;
        job.refresh()?;
        Ok(job)
    }

    /// Delete a job, returning the server's confirmation message.
    #[instrument(skip(self))]
    pub fn delete_job(&self, pid: &str) -> ClientResult<String> {
        self.job(pid)?.delete()
    }

    /// Disk and per-project quotas of the token's owner.
    #[instrument(skip(self))]
    pub fn quota_info(&self) -> ClientResult<QuotaInfo> {
        let request = ApiRequest::get(api::quotas_url(&self.base_url)).with_headers(&self.headers);
        let body = self.requester.json(request, api::QUOTA_REQUIRED_KEYS)?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid quota payload: {e}")))
    }

    /// Log the quota table.
    pub fn print_quota_info(&self) -> ClientResult<()> {
        let quota = self.quota_info()?;
        info!("{}", format_quota(&quota));
        Ok(())
    }

    /// Jobs owned by the token's owner.
    #[instrument(skip(self))]
    pub fn jobs_info(&self) -> ClientResult<Vec<JobInfo>> {
        let request = ApiRequest::get(api::jobs_url(&self.base_url)).with_headers(&self.headers);
        let body = self.requester.json(request, &[])?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid job list: {e}")))
    }

    /// Log the job table.
    pub fn print_job_info(&self) -> ClientResult<()> {
        let jobs = self.jobs_info()?;
        match format_jobs(&jobs)? {
            Some(table) => info!("{table}"),
            None => info!("No jobs found in database for user"),
        }
        Ok(())
    }
}

/// Quota summary and per-project table.
pub fn format_quota(quota: &QuotaInfo) -> String {
    let disk = &quota.disk_quota;
    let rows: Vec<Vec<String>> = quota
        .projectquotas
        .iter()
        .map(|pq| {
            vec![
                pq.project.clone(),
                pq.partition.name.clone(),
                pq.partition
                    .max_num_qubits
                    .map_or_else(|| "-".to_string(), |q| q.to_string()),
                pq.partition.hardware_type.clone(),
                pq.partition.description.clone(),
                pq.partition.status.clone(),
                format!("{:.2}", pq.seconds_left),
                format!("{:.0}", pq.shots_left),
                format!("{:.0}", pq.jobs_left),
            ]
        })
        .collect();

    format!(
        "User: {}\nDisk quota left [KBs]: {:.2} / {:.2}\n{}",
        disk.user.email,
        disk.kbs_left,
        disk.kbs_max,
        render_table(
            &[
                "Project Name",
                "Device Name",
                "Qubits",
                "Type",
                "Description",
                "Status",
                "Time Left [s]",
                "Shots Left",
                "Jobs Left",
            ],
            &rows,
        )
    )
}

/// Job table for a single user, `None` when the list is empty.
///
/// A listing that spans more than one user is rejected.
pub fn format_jobs(jobs: &[JobInfo]) -> ClientResult<Option<String>> {
    if jobs.is_empty() {
        return Ok(None);
    }

    let users: BTreeSet<&str> = jobs.iter().map(|j| j.user.email.as_str()).collect();
    if users.len() > 1 {
        return Err(ClientError::MalformedResponse(format!(
            "job list spans several users: {}",
            users.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|j| {
            vec![
                j.pid.clone(),
                format_timestamp(&j.created_at),
                format_timestamp(&j.updated_at),
                j.status.clone(),
                j.result_path.clone().unwrap_or_default(),
            ]
        })
        .collect();

    Ok(Some(format!(
        "User: {}\n{}",
        jobs[0].user.email,
        render_table(&["Pid", "Created At", "Updated At", "Status", "Results"], &rows)
    )))
}
