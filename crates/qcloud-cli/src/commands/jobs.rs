//! Jobs command implementation.

use anyhow::Result;

use qcloud_client::client::format_jobs;

use super::common::{ClientArgs, create_client};

/// Execute the jobs command.
pub fn execute(args: &ClientArgs) -> Result<()> {
    let client = create_client(args)?;
    let jobs = client.jobs_info()?;

    match format_jobs(&jobs)? {
        Some(table) => println!("{table}"),
        None => println!("No jobs found in database for user"),
    }
    Ok(())
}
