//! Version command implementation.

use console::style;

use qcloud_client::api::BASE_URL;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - remote quantum job client",
        style("qcloud").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qcloud-client  Job submission, polling and result retrieval");
    println!("  qcloud-cli     Command-line interface");
    println!();
    println!("Default server: {}", style(BASE_URL).underlined());
    println!("License:        {}", style("Apache-2.0").dim());
}
