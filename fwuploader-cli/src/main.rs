//! fwuploader CLI - Push files to development boards over serial.
//!
//! ## Features
//!
//! - List serial ports and watch for a board re-enumerating
//! - Reboot a board into its bootloader through the helper sketch
//! - Query the helper sketch's firmware version
//! - Send and receive files with YMODEM-1K
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use fwuploader::{
    NativePortEnumerator, PortEnumerator, SerialConfig,
    port::{COMMAND_BAUD_RATE, TRANSFER_BAUD_RATE},
};
use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;

use config::Config;

/// Errors that map to a specific exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// The invocation cannot work as given (exit code 2).
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
        }
    }
}

/// fwuploader - Upload files to development boards over serial.
///
/// Environment variables:
///   FWUPLOADER_PORT    - Default serial port
///   FWUPLOADER_BAUD    - Transfer baud rate (default: 115200)
///   FWUPLOADER_CONFIG  - Configuration file path
#[derive(Parser)]
#[command(name = "fwuploader")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Examples:\n  fwuploader reboot\n  fwuploader -p /dev/ttyACM1 send roots.pem")]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if exactly one is present).
    #[arg(short, long, global = true, env = "FWUPLOADER_PORT")]
    pub(crate) port: Option<String>,

    /// Baud rate for file transfers.
    #[arg(short, long, global = true, env = "FWUPLOADER_BAUD")]
    pub(crate) baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Path to a configuration file.
    #[arg(
        long = "config",
        global = true,
        value_name = "PATH",
        env = "FWUPLOADER_CONFIG"
    )]
    pub(crate) config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Wait for a new serial port to appear and print its name.
    Watch,

    /// Reboot the board into its bootloader.
    Reboot {
        /// Do not wait for the board to come back.
        #[arg(long)]
        no_watch: bool,
    },

    /// Print the firmware version reported by the board.
    Version,

    /// Send a file with YMODEM.
    Send {
        /// File to send.
        file: PathBuf,

        /// Name announced to the receiver (defaults to the file's name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Receive one file with YMODEM.
    Receive {
        /// Directory to store the file in (default: current directory).
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Transfer baud rate: flag or env, then config, then the default.
    pub(crate) fn transfer_baud(&self, config: &Config) -> u32 {
        self.baud
            .or(config.connection.baud)
            .unwrap_or(TRANSFER_BAUD_RATE)
    }
}

/// Command baud rate from config, or the helper sketch's default.
pub(crate) fn command_baud(config: &Config) -> u32 {
    config.connection.command_baud.unwrap_or(COMMAND_BAUD_RATE)
}

/// Serial settings for `port` at `baud`, with the configured timeout.
pub(crate) fn serial_config(config: &Config, port: &str, baud: u32) -> SerialConfig {
    let serial = SerialConfig::new(port, baud);
    match config.timeout() {
        Some(timeout) => serial.with_timeout(timeout),
        None => serial,
    }
}

/// Get serial port from CLI args, config, or the only port present.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    if let Some(port) = cli.port.as_ref().or(config.connection.port.as_ref()) {
        return Ok(port.clone());
    }

    let ports = NativePortEnumerator.list_ports()?;
    match ports.as_slice() {
        [only] => {
            info!("Using {}", only.describe());
            Ok(only.name.clone())
        },
        [] => Err(
            CliError::Usage("No serial port found; connect a board or pass --port".into()).into(),
        ),
        _ => {
            let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
            Err(CliError::Usage(format!(
                "Found multiple serial ports ({}); pass --port",
                names.join(", ")
            ))
            .into())
        },
    }
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "fwuploader v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(code)
        },
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::Watch => commands::ports::cmd_watch(cli, config),
        Commands::Reboot { no_watch } => commands::device::cmd_reboot(cli, config, *no_watch),
        Commands::Version => commands::device::cmd_version(cli, config),
        Commands::Send { file, name } => {
            commands::transfer::cmd_send(cli, config, file, name.as_deref())
        },
        Commands::Receive { output } => {
            commands::transfer::cmd_receive(cli, config, output.as_deref())
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}
