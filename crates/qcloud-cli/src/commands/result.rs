//! Result command implementation.

use anyhow::Result;
use tracing::debug;

use super::common::{ClientArgs, create_client, print_no_result, print_result, wait_options};

/// Execute the result command.
pub fn execute(args: &ClientArgs, pid: &str, interval: Option<f64>) -> Result<()> {
    let wait = wait_options(interval)?;
    let client = create_client(args)?;

    let mut job = client.job(pid)?;
    debug!(pid, interval = ?wait.interval, "waiting for result");
    match job.result(&wait)? {
        Some(result) => print_result(&result),
        None => print_no_result(pid),
    }
    Ok(())
}
