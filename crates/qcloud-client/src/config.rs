//! Client configuration.
//!
//! Supports loading configuration from:
//! 1. A YAML file (`<config dir>/qcloud/config.yaml` by default)
//! 2. Environment variables (with `QCLOUD_` prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::BASE_URL;
use crate::error::{ClientError, ClientResult};

pub const ENV_BASE_URL: &str = "QCLOUD_BASE_URL";
pub const ENV_TOKEN: &str = "QCLOUD_TOKEN";
pub const ENV_RESULTS_DIR: &str = "QCLOUD_RESULTS_DIR";
pub const ENV_POLL_INTERVAL: &str = "QCLOUD_POLL_INTERVAL";
pub const ENV_REQUEST_TIMEOUT: &str = "QCLOUD_REQUEST_TIMEOUT";
pub const ENV_MAX_UNKNOWN_POLLS: &str = "QCLOUD_MAX_UNKNOWN_POLLS";

/// Settings for talking to the job server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server root, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token (set via QCLOUD_TOKEN).
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Directory under which each job gets a `<pid>/` results folder.
    #[serde(default = "default_results_base_dir")]
    pub results_base_dir: PathBuf,

    /// Seconds between status checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,

    /// Consecutive unrecognized statuses tolerated before giving up.
    /// `0` disables the limit.
    #[serde(default = "default_max_unknown_polls")]
    pub max_unknown_polls: u32,
}

fn default_base_url() -> String {
    BASE_URL.to_string()
}

fn default_results_base_dir() -> PathBuf {
    std::env::temp_dir().join("qcloud_client")
}

fn default_poll_interval() -> f64 {
    2.0
}

fn default_request_timeout() -> f64 {
    60.0
}

fn default_max_unknown_polls() -> u32 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            results_base_dir: default_results_base_dir(),
            poll_interval_seconds: default_poll_interval(),
            request_timeout_seconds: default_request_timeout(),
            max_unknown_polls: default_max_unknown_polls(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("results_base_dir", &self.results_base_dir)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("max_unknown_polls", &self.max_unknown_polls)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        serde_yaml_ng::from_str(&contents)
            .map_err(|e| ClientError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qcloud").join("config.yaml"))
    }

    /// Load configuration with the following precedence:
    /// 1. Load from `config_file`, or from the default path if it exists
    /// 2. Apply environment variable overrides
    /// 3. Validate
    pub fn load(config_file: Option<&Path>) -> ClientResult<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    debug!("loading configuration from {}", path.display());
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge variables from `lookup` into this configuration.
    ///
    /// Only variables that are set override the current values. Values that
    /// fail to parse are ignored with a warning.
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = lookup(ENV_TOKEN) {
            self.token = Some(v);
        }
        if let Some(v) = lookup(ENV_RESULTS_DIR) {
            self.results_base_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL) {
            match v.parse() {
                Ok(val) => self.poll_interval_seconds = val,
                Err(_) => warn!("ignoring {ENV_POLL_INTERVAL}={v}: not a number"),
            }
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT) {
            match v.parse() {
                Ok(val) => self.request_timeout_seconds = val,
                Err(_) => warn!("ignoring {ENV_REQUEST_TIMEOUT}={v}: not a number"),
            }
        }
        if let Some(v) = lookup(ENV_MAX_UNKNOWN_POLLS) {
            match v.parse() {
                Ok(val) => self.max_unknown_polls = val,
                Err(_) => warn!("ignoring {ENV_MAX_UNKNOWN_POLLS}={v}: not an integer"),
            }
        }
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> ClientResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".to_string()));
        }

        if seconds_to_duration(self.poll_interval_seconds).is_none() {
            return Err(ClientError::Config(format!(
                "poll_interval_seconds must be a positive duration, got {}",
                self.poll_interval_seconds
            )));
        }

        if seconds_to_duration(self.request_timeout_seconds).is_none() {
            return Err(ClientError::Config(format!(
                "request_timeout_seconds must be a positive duration, got {}",
                self.request_timeout_seconds
            )));
        }

        if let Some(token) = &self.token {
            if token.trim().is_empty() {
                return Err(ClientError::Config(
                    "token must not be empty; omit the field instead".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Set the API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the server root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the directory that holds per-job results folders.
    pub fn with_results_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_base_dir = dir.into();
        self
    }

    /// Set the time between status checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_seconds = interval.as_secs_f64();
        self
    }

    /// Set the consecutive unrecognized-status limit.
    pub fn with_max_unknown_polls(mut self, limit: u32) -> Self {
        self.max_unknown_polls = limit;
        self
    }

    /// Server root with any trailing slash removed.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn poll_interval(&self) -> Duration {
        positive_duration(self.poll_interval_seconds, default_poll_interval())
    }

    pub fn request_timeout(&self) -> Duration {
        positive_duration(self.request_timeout_seconds, default_request_timeout())
    }

    /// Per-job settings derived from this configuration.
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            results_base_dir: self.results_base_dir.clone(),
            poll_interval: self.poll_interval(),
            max_unknown_polls: self.max_unknown_polls,
        }
    }
}

/// `seconds` as a [`Duration`], or `None` unless it is positive and
/// representable.
pub fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

fn positive_duration(seconds: f64, fallback: f64) -> Duration {
    seconds_to_duration(seconds)
        .or_else(|| seconds_to_duration(fallback))
        .unwrap_or(Duration::from_secs(1))
}

/// The subset of [`ClientConfig`] each [`Job`](crate::Job) carries.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub results_base_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_unknown_polls: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        ClientConfig::default().job_settings()
    }
}
