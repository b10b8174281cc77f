//! Port listing and hot-plug watching.

use anyhow::{Context, Result, bail};
use console::style;
use fwuploader::{NativePortEnumerator, PortEnumerator, PortWatcher};

use crate::Cli;
use crate::config::Config;

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator
        .list_ports()
        .context("Failed to list serial ports")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("(none)").dim());
    } else {
        for port in &ports {
            eprintln!("  {} {}", style("•").green(), port.describe());
        }
    }

    Ok(())
}

/// Watch command implementation.
///
/// Prints the new port's name on stdout so scripts can capture it.
pub(crate) fn cmd_watch(cli: &Cli, config: &Config) -> Result<()> {
    let watcher = PortWatcher::new(NativePortEnumerator).with_config(config.watch_config());
    let baseline = watcher.snapshot().context("Failed to list serial ports")?;

    if !cli.quiet {
        eprintln!(
            "{} Waiting up to {:?} for a new serial port ({} present)",
            style("⏳").yellow(),
            watcher.config().window,
            baseline.len()
        );
    }

    match watcher.await_new_port(&baseline)? {
        Some(port) => {
            println!("{port}");
            Ok(())
        },
        None => bail!(
            "No new serial port appeared within {:?}",
            watcher.config().window
        ),
    }
}
