//! qcloud command-line interface.
//!
//! Submit circuits to the quantum cloud, follow their progress and fetch
//! results.
//!
//! ```text
//! qcloud run --input bell.qasm --device sim --shots 1000
//! qcloud status <pid>
//! qcloud result <pid>
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::ClientArgs;
use commands::{delete, jobs, quota, result, run, status, version};

/// qcloud - run quantum circuits on a remote cloud
#[derive(Parser)]
#[command(name = "qcloud")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "QCLOUD_CONFIG")]
    config: Option<PathBuf>,

    /// File holding the API token
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a circuit and wait for its result
    Run {
        /// Circuit file (OpenQASM)
        #[arg(short, long)]
        input: PathBuf,

        /// Target device
        #[arg(short, long)]
        device: String,

        /// Project charged for the run
        #[arg(short, long)]
        project: Option<String>,

        /// Number of shots
        #[arg(short, long)]
        shots: Option<u64>,

        /// Skip transpilation on the server
        #[arg(long)]
        verbatim: bool,

        /// Print the pid and exit without waiting
        #[arg(long)]
        no_wait: bool,

        /// Seconds between status checks
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Show the status of a job
    Status {
        /// Job pid
        pid: String,
    },

    /// Wait for a job and print its result
    Result {
        /// Job pid
        pid: String,

        /// Seconds between status checks
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Delete a job on the server
    Delete {
        /// Job pid
        pid: String,
    },

    /// Show disk and project quotas
    Quota,

    /// List your jobs
    Jobs,

    /// Show version information
    Version,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,qcloud_client=info,qcloud=info",
        1 => "info,qcloud_client=debug,qcloud=debug",
        _ => "trace",
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = ClientArgs {
        config: cli.config,
        token_file: cli.token_file,
    };

    let result = match cli.command {
        Commands::Run {
            input,
            device,
            project,
            shots,
            verbatim,
            no_wait,
            interval,
        } => run::execute(
            &args,
            &input,
            &device,
            project.as_deref(),
            shots,
            verbatim,
            no_wait,
            interval,
        ),

        Commands::Status { pid } => status::execute(&args, &pid),

        Commands::Result { pid, interval } => result::execute(&args, &pid, interval),

        Commands::Delete { pid } => delete::execute(&args, &pid),

        Commands::Quota => quota::execute(&args),

        Commands::Jobs => jobs::execute(&args),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "qcloud", "run", "--input", "bell.qasm", "--device", "sim", "--shots", "100", "--no-wait",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                input,
                device,
                shots,
                no_wait,
                verbatim,
                project,
                interval,
            } => {
                assert_eq!(input, PathBuf::from("bell.qasm"));
                assert_eq!(device, "sim");
                assert_eq!(shots, Some(100));
                assert!(no_wait);
                assert!(!verbatim);
                assert_eq!(project, None);
                assert_eq!(interval, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_device() {
        assert!(Cli::try_parse_from(["qcloud", "run", "--input", "bell.qasm"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "qcloud", "result", "abc", "-vv", "--token-file", "/tmp/token", "--interval", "0.5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.token_file, Some(PathBuf::from("/tmp/token")));
        assert!(matches!(
            cli.command,
            Commands::Result { ref pid, interval: Some(i) } if pid == "abc" && i == 0.5
        ));
    }

    #[test]
    fn test_log_filter_levels() {
        assert!(log_filter(0).contains("qcloud_client=info"));
        assert!(log_filter(1).contains("qcloud_client=debug"));
        assert_eq!(log_filter(5), "trace");
    }
}
