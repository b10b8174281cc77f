//! YMODEM send and receive.

use anyhow::{Context, Result, bail};
use console::style;
use fwuploader::{NativePort, YmodemReceiver, YmodemSender};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::{Cli, CliError, get_port, serial_config, use_fancy_output};

/// Fallback name for a received file whose header carries no usable name.
const UNNAMED_FILE: &str = "received.bin";

/// Send command implementation.
pub(crate) fn cmd_send(cli: &Cli, config: &Config, file: &Path, name: Option<&str>) -> Result<()> {
    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::Usage(format!("{} has no file name", file.display())))?,
    };

    let port = get_port(cli, config)?;
    let baud = cli.transfer_baud(config);
    if !cli.quiet {
        eprintln!(
            "{} Sending {name} ({} bytes) on {port} ({baud} baud)",
            style("📦").cyan(),
            data.len()
        );
    }

    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(data.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                     {bytes}/{total_bytes} {msg}",
                )?
                .progress_chars("#>-"),
        );
        pb
    };

    let result = NativePort::with_port(&serial_config(config, &port, baud), |p| {
        YmodemSender::with_config(p, config.sender_config()).send_with_progress(
            &data,
            &name,
            |current, _| pb.set_position(current as u64),
        )
    });
    pb.finish_and_clear();
    let report = result.with_context(|| format!("Failed to send {name} on {port}"))?;

    if report.retries_exhausted {
        bail!(
            "Board kept refusing data; only {}/{} blocks of {name} arrived",
            report.blocks_acked,
            report.blocks
        );
    }

    if !cli.quiet {
        eprintln!(
            "{} Sent {name} ({} blocks, {} retries)",
            style("✓").green().bold(),
            report.blocks,
            report.failures
        );
    }
    Ok(())
}

/// Receive command implementation.
///
/// Prints the stored file's path on stdout.
pub(crate) fn cmd_receive(cli: &Cli, config: &Config, output: Option<&Path>) -> Result<()> {
    let dir = output.unwrap_or_else(|| Path::new("."));
    if !dir.is_dir() {
        return Err(CliError::Usage(format!("{} is not a directory", dir.display())).into());
    }

    let port = get_port(cli, config)?;
    let baud = cli.transfer_baud(config);
    if !cli.quiet {
        eprintln!(
            "{} Waiting for a file on {port} ({baud} baud)",
            style("⏳").yellow()
        );
    }

    let file = NativePort::with_port(&serial_config(config, &port, baud), |p| {
        YmodemReceiver::with_config(p, config.receiver_config()).receive()
    })
    .with_context(|| format!("Failed to receive a file on {port}"))?;

    // Never let the sender choose a path outside `dir`.
    let name = Path::new(&file.filename)
        .file_name()
        .map_or_else(|| UNNAMED_FILE.into(), |n| n.to_string_lossy().into_owned());
    let path = dir.join(&name);
    fs::write(&path, &file.data).with_context(|| format!("Failed to write {}", path.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} Received {name} ({} bytes)",
            style("✓").green().bold(),
            file.data.len()
        );
    }
    println!("{}", path.display());
    Ok(())
}
