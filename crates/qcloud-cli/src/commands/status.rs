//! Status command implementation.

use anyhow::Result;
use console::style;

use qcloud_client::JobStatus;
use qcloud_client::render::format_hms;

use super::common::{ClientArgs, create_client};

/// Execute the status command.
pub fn execute(args: &ClientArgs, pid: &str) -> Result<()> {
    let client = create_client(args)?;
    let job = client.get_job(pid)?;

    let status = job
        .cached_status()
        .cloned()
        .unwrap_or_else(|| JobStatus::Unknown(String::new()));
    let status_styled = match status {
        JobStatus::Success => style(status.to_string()).green(),
        JobStatus::Error => style(status.to_string()).red(),
        JobStatus::Pending | JobStatus::Queueing => style(status.to_string()).yellow(),
        _ => style(status.to_string()).cyan(),
    };

    println!("{} Job {}", style("→").cyan().bold(), style(job.pid()).bold());
    println!("  Status:   {status_styled}");
    if let Some(device) = job.device() {
        println!("  Device:   {device}");
    }
    if let Some(project) = job.project() {
        println!("  Project:  {project}");
    }
    if let Some(nshots) = job.nshots() {
        println!("  Shots:    {nshots}");
    }
    if status == JobStatus::Pending {
        println!(
            "  Queue:    position {}, max ETD {}",
            job.queue_position()
                .map_or_else(|| "-".to_string(), |p| p.to_string()),
            format_hms(job.etd_seconds())
        );
        if let Some(updated) = job.queue_last_update() {
            println!("  Updated:  {updated}");
        }
    }
    Ok(())
}
