//! Quota command implementation.

use anyhow::Result;

use qcloud_client::client::format_quota;

use super::common::{ClientArgs, create_client};

/// Execute the quota command.
pub fn execute(args: &ClientArgs) -> Result<()> {
    let client = create_client(args)?;
    let quota = client.quota_info()?;
    println!("{}", format_quota(&quota));
    Ok(())
}
