//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use tracing::debug;

use qcloud_client::config::seconds_to_duration;
use qcloud_client::{Client, ClientConfig, JobResult, WaitOptions};

/// Global options that shape the client.
#[derive(Debug, Clone, Default)]
pub struct ClientArgs {
    pub config: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
}

/// Read a token file, ignoring surrounding whitespace.
pub fn read_token_file(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let token = raw.trim();
    if token.is_empty() {
        anyhow::bail!("Token file is empty: {}", path.display());
    }
    Ok(token.to_string())
}

/// Load configuration, letting `--token-file` override any configured token.
pub fn load_config(args: &ClientArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(path) = &args.token_file {
        debug!("reading token from {}", path.display());
        config = config.with_token(read_token_file(path)?);
    }
    Ok(config)
}

/// Create a client from the global options.
pub fn create_client(args: &ClientArgs) -> Result<Client> {
    let config = load_config(args)?;
    debug!(?config, "creating client");
    Ok(Client::new(config)?)
}

/// Wait options for interactive use.
pub fn wait_options(interval: Option<f64>) -> Result<WaitOptions> {
    let mut options = WaitOptions::verbose();
    if let Some(seconds) = interval {
        let Some(interval) = seconds_to_duration(seconds) else {
            anyhow::bail!("--interval must be a positive number of seconds, got {seconds}");
        };
        options = options.with_interval(interval);
    }
    Ok(options)
}

/// Print a retrieved result.
pub fn print_result(result: &JobResult) {
    println!(
        "\n{} Result {:?} saved at {}",
        style("✓").green().bold(),
        result.shape(),
        style(result.path().display()).dim()
    );

    let values: Vec<f64> = result.data().iter().copied().collect();
    for (i, value) in values.iter().take(16).enumerate() {
        println!("  {:>4}: {}", style(i).cyan(), value);
    }
    if values.len() > 16 {
        println!("  ... and {} more values", values.len() - 16);
    }
}

/// Print the outcome of a job that produced no result.
pub fn print_no_result(pid: &str) {
    println!(
        "{} Job {} produced no result; see the log output above",
        style("✗").red().bold(),
        style(pid).dim()
    );
}
