//! Run command implementation.
//!
//! Submit a circuit file and, unless `--no-wait` is given, wait for the result.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use tracing::debug;

use qcloud_client::SubmitOptions;

use super::common::{ClientArgs, create_client, print_no_result, print_result, wait_options};

/// Execute the run command.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    args: &ClientArgs,
    input: &Path,
    device: &str,
    project: Option<&str>,
    shots: Option<u64>,
    verbatim: bool,
    no_wait: bool,
    interval: Option<f64>,
) -> Result<()> {
    let circuit = fs::read_to_string(input)
        .with_context(|| format!("Failed to read circuit file: {}", input.display()))?;
    debug!("read {} bytes from {}", circuit.len(), input.display());
    let wait = wait_options(interval)?;
    let client = create_client(args)?;

    let mut options = SubmitOptions::default().verbatim(verbatim);
    if let Some(project) = project {
        options = options.with_project(project);
    }
    if let Some(shots) = shots {
        options = options.with_shots(shots);
    }

    let mut job = client.run_circuit(&circuit, device, &options)?;
    println!(
        "{} Submitted {} to {} as {}",
        style("→").cyan().bold(),
        style(input.display()).dim(),
        style(device).yellow(),
        style(job.pid()).bold()
    );

    if no_wait {
        println!("  Use 'qcloud result {}' to fetch the result later.", job.pid());
        return Ok(());
    }

    match job.result(&wait)? {
        Some(result) => print_result(&result),
        None => print_no_result(job.pid()),
    }
    Ok(())
}
