//! Delete command implementation.

use anyhow::Result;
use console::style;

use super::common::{ClientArgs, create_client};

/// Execute the delete command.
pub fn execute(args: &ClientArgs, pid: &str) -> Result<()> {
    let client = create_client(args)?;
    let detail = client.delete_job(pid)?;

    if detail.is_empty() {
        println!("{} Deleted job {}", style("✓").green().bold(), style(pid).dim());
    } else {
        println!("{} {}", style("✓").green().bold(), detail);
    }
    Ok(())
}
