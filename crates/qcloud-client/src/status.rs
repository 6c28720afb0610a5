//! Job status state machine.
//!
//! ```text
//!   QUEUEING ──→ PENDING ──→ RUNNING ──→ POSTPROCESSING ──→ SUCCESS
//!                                                     └───→ ERROR
//! ```
//!
//! The server owns the transitions; the client only maps the reported string
//! onto a variant. `SUCCESS` and `ERROR` are terminal. Strings the client does
//! not recognize become [`JobStatus::Unknown`] and are treated as
//! non-terminal.

use serde::{Deserialize, Serialize};

/// Status of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted, waiting for a queue slot.
    Queueing,
    /// In the queue, position and ETA may be known.
    Pending,
    /// Executing on the device.
    Running,
    /// Execution finished, results are being packaged.
    Postprocessing,
    /// Finished; results are available.
    Success,
    /// Finished with an error; logs are available.
    Error,
    /// Status string not recognized by this client.
    Unknown(String),
}

impl JobStatus {
    /// Map a server-reported status string to a variant.
    ///
    /// Matching ignores case and surrounding whitespace. Never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queueing" => JobStatus::Queueing,
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "postprocessing" => JobStatus::Postprocessing,
            "success" => JobStatus::Success,
            "error" => JobStatus::Error,
            _ => JobStatus::Unknown(raw.to_string()),
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    /// Check if the server reported something this client does not know.
    pub fn is_unknown(&self) -> bool {
        matches!(self, JobStatus::Unknown(_))
    }

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queueing => "QUEUEING",
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Postprocessing => "POSTPROCESSING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Error => "ERROR",
            JobStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recognized() {
        assert_eq!(JobStatus::parse("queueing"), JobStatus::Queueing);
        assert_eq!(JobStatus::parse("pending"), JobStatus::Pending);
        assert_eq!(JobStatus::parse("running"), JobStatus::Running);
        assert_eq!(JobStatus::parse("postprocessing"), JobStatus::Postprocessing);
        assert_eq!(JobStatus::parse("success"), JobStatus::Success);
        assert_eq!(JobStatus::parse("error"), JobStatus::Error);
    }

    #[test]
    fn test_parse_ignores_case_and_whitespace() {
        assert_eq!(JobStatus::parse("SUCCESS"), JobStatus::Success);
        assert_eq!(JobStatus::parse(" Running\n"), JobStatus::Running);
    }

    #[test]
    fn test_parse_unknown_keeps_raw() {
        assert_eq!(
            JobStatus::parse("cancelled"),
            JobStatus::Unknown("cancelled".into())
        );
        assert_eq!(JobStatus::parse(""), JobStatus::Unknown(String::new()));
        assert_eq!(JobStatus::from("done"), JobStatus::Unknown("done".into()));
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queueing.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Postprocessing.is_terminal());
        assert!(!JobStatus::Unknown("x".into()).is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(JobStatus::Pending.to_string(), "PENDING");
        assert_eq!(
            JobStatus::Unknown("paused".into()).to_string(),
            "UNKNOWN(paused)"
        );
    }
}
