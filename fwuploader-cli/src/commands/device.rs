//! Helper sketch commands: reboot and firmware version.

use anyhow::{Context, Result, bail};
use console::style;
use fwuploader::{
    Command, NativePort, NativePortEnumerator, PortWatcher, query_firmware_version,
    send_command_and_close,
};

use crate::config::Config;
use crate::{Cli, command_baud, get_port, serial_config};

/// Reboot command implementation.
pub(crate) fn cmd_reboot(cli: &Cli, config: &Config, no_watch: bool) -> Result<()> {
    let port = get_port(cli, config)?;
    let watcher = PortWatcher::new(NativePortEnumerator).with_config(config.watch_config());
    let baseline = watcher.snapshot().context("Failed to list serial ports")?;

    let baud = command_baud(config);
    if !cli.quiet {
        eprintln!(
            "{} Rebooting board on {port} ({baud} baud)",
            style("🔌").cyan()
        );
    }
    let serial = NativePort::open(&serial_config(config, &port, baud))
        .with_context(|| format!("Failed to open {port}"))?;
    send_command_and_close(serial, Command::Reboot)
        .with_context(|| format!("Failed to send reboot command to {port}"))?;

    if no_watch {
        return Ok(());
    }

    if !cli.quiet {
        eprintln!("{} Waiting for the board to come back", style("⏳").yellow());
    }
    match watcher.await_new_port(&baseline)? {
        Some(new_port) => {
            if !cli.quiet {
                eprintln!("{} Board is back on {new_port}", style("✓").green());
            }
            println!("{new_port}");
            Ok(())
        },
        None => bail!(
            "Board did not re-enumerate within {:?}",
            watcher.config().window
        ),
    }
}

/// Version command implementation.
pub(crate) fn cmd_version(cli: &Cli, config: &Config) -> Result<()> {
    let port = get_port(cli, config)?;
    let serial = serial_config(config, &port, command_baud(config));

    let version = NativePort::with_port(&serial, query_firmware_version)
        .with_context(|| format!("Failed to read firmware version from {port}"))?;

    println!("{version}");
    Ok(())
}
