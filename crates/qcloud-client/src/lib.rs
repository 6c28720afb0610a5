//! Client for a remote quantum cloud.
//!
//! Submits circuits to a job server, polls their status until they finish
//! and unpacks the result archive into a per-job folder on local disk.
//!
//! # Job lifecycle
//!
//! ```text
//!   QUEUEING ──→ PENDING ──→ RUNNING ──→ POSTPROCESSING ──→ SUCCESS
//!                                                     └───→ ERROR
//! ```
//!
//! | Terminal status | Download contains             | `Job::result` returns |
//! |-----------------|-------------------------------|-----------------------|
//! | `SUCCESS`       | `results.npy`                 | `Ok(Some(JobResult))` |
//! | `ERROR`         | `stdout.log`, `stderr.log`    | `Ok(None)`, logs shown |
//! | either, corrupt | anything else                 | `Ok(None)`, raw bytes kept |
//!
//! # Authentication
//!
//! Set `QCLOUD_TOKEN`, or put `token:` in `~/.config/qcloud/config.yaml`:
//!
//! ```bash
//! export QCLOUD_TOKEN="your-token"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use qcloud_client::{Client, ClientConfig, SubmitOptions, WaitOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let client = Client::new(ClientConfig::load(None)?)?;
//!
//!     let circuit = std::fs::read_to_string("bell.qasm")?;
//!     let mut job = client.run_circuit(&circuit, "sim", &SubmitOptions::default().with_shots(1000))?;
//!     println!("Job: {}", job.pid());
//!
//!     if let Some(result) = job.result(&WaitOptions::verbose())? {
//!         println!("Results: {:?}", result.data());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod poll;
pub mod render;
pub mod result;
pub mod snapshot;
pub mod status;
pub mod transport;

pub use api::{JobInfo, QuotaInfo};
pub use archive::{ArchivePipeline, UnpackOutcome};
pub use client::{Client, SubmitOptions};
pub use config::{ClientConfig, JobSettings};
pub use error::{ApiError, ClientError, ClientResult};
pub use job::{Job, ObserverKind, WaitOptions};
pub use poll::{Poller, Sleeper, StatusObserver, ThreadSleeper};
pub use render::{LogObserver, SilentObserver, SpinnerObserver};
pub use result::JobResult;
pub use snapshot::JobSnapshot;
pub use status::JobStatus;
pub use transport::{ApiRequest, HttpTransport, Method, RawResponse, Requester, Transport, TransportFailure};
