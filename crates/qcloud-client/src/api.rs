//! Job server REST endpoints and wire types.
//!
//! All paths are relative to the configured base URL and end with a slash,
//! as the server expects.

use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default job server.
pub const BASE_URL: &str = "https://cloud.qibo.science";

/// Status key every job payload must carry.
pub const JOB_REQUIRED_KEYS: &[&str] = &["status"];

/// Keys every quota payload must carry.
pub const QUOTA_REQUIRED_KEYS: &[&str] = &["disk_quota", "projectquotas"];

/// Whether `pid` is a single plain path segment.
///
/// The pid is used both as a URL segment and as the name of the job's
/// results folder, so separators, `.`/`..` and absolute forms are refused.
pub fn is_valid_pid(pid: &str) -> bool {
    if pid.trim().is_empty() || pid.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(pid).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn jobs_url(base_url: &str) -> String {
    format!("{base_url}/jobs/")
}

pub fn job_url(base_url: &str, pid: &str) -> String {
    format!("{base_url}/jobs/{pid}/")
}

pub fn download_url(base_url: &str, pid: &str) -> String {
    format!("{base_url}/jobs/{pid}/download/")
}

pub fn quotas_url(base_url: &str) -> String {
    format!("{base_url}/quotas/")
}

/// Authorization header for a token.
pub fn auth_headers(token: &str) -> Vec<(String, String)> {
    vec![("Authorization".to_string(), format!("Bearer {token}"))]
}

/// Body of `POST /jobs/`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub circuit: &'a str,
    pub device: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nshots: Option<u64>,
    pub verbatim: bool,
}

/// Response of `POST /jobs/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "pid_string_or_number")]
    pub pid: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PidRepr {
    Text(String),
    Number(u64),
}

/// Accept pids sent either as strings or as integers.
fn pid_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<PidRepr>::deserialize(deserializer)?.map(|pid| match pid {
        PidRepr::Text(text) => text,
        PidRepr::Number(number) => number.to_string(),
    }))
}

/// Default reason when a submission comes back without a pid.
pub const POST_FAILED_DETAIL: &str = "Server failed to post job to queue";

impl SubmitResponse {
    /// Reason reported by the server for not queueing the job.
    pub fn failure_detail(&self) -> String {
        self.detail
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(POST_FAILED_DETAIL)
            .to_string()
    }
}

/// Response of `DELETE /jobs/{pid}/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Response of `GET /jobs/{pid}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPayload {
    pub status: String,
    #[serde(default)]
    pub queue_position: Option<u64>,
    #[serde(default)]
    pub etd_seconds: Option<f64>,
    #[serde(default)]
    pub queue_last_update: Option<String>,
    #[serde(default)]
    pub circuit: Option<Value>,
    #[serde(default)]
    pub nshots: Option<u64>,
    #[serde(default)]
    pub device: Option<DeviceRef>,
    #[serde(default)]
    pub projectquota: Option<ProjectQuotaRef>,
}

/// Device as embedded in a job payload: either a bare name or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeviceRef {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl DeviceRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            DeviceRef::Name(name) => Some(name),
            DeviceRef::Object { name } => name.as_deref(),
        }
    }
}

/// Project quota as embedded in a job payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectQuotaRef {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub partition: Option<PartitionRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartitionRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Account owning a job or quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub email: String,
}

/// Response of `GET /quotas/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub disk_quota: DiskQuota,
    pub projectquotas: Vec<ProjectQuota>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskQuota {
    pub user: UserRef,
    pub kbs_left: f64,
    pub kbs_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectQuota {
    pub project: String,
    pub partition: Partition,
    pub seconds_left: f64,
    pub shots_left: f64,
    pub jobs_left: f64,
}

/// Hardware partition a project has access to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    #[serde(default)]
    pub max_num_qubits: Option<u32>,
    #[serde(default)]
    pub hardware_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

/// One entry of `GET /jobs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub pid: String,
    pub user: UserRef,
    pub created_at: String,
    pub updated_at: String,
    pub status: String,
    #[serde(default)]
    pub result_path: Option<String>,
}
