//! Configuration file support for fwuploader.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (FWUPLOADER_*)
//! 3. Local config file (./fwuploader.toml)
//! 4. Global config file (~/.config/fwuploader/config.toml)
//!
//! `--config PATH` replaces 3 and 4 with a single file.

use directories::ProjectDirs;
use fwuploader::{ReceiverConfig, RetryExhaustion, SenderConfig, WatchConfig};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project config file.
pub const LOCAL_CONFIG_FILE: &str = "fwuploader.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub port: Option<String>,
    /// Baud rate for transfers.
    pub baud: Option<u32>,
    /// Baud rate for board commands.
    pub command_baud: Option<u32>,
    /// Read timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Port watcher timing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSection {
    /// How long to wait for the board to re-enumerate.
    pub window_ms: Option<u64>,
    /// Pause between port listings.
    pub poll_interval_ms: Option<u64>,
    /// How long a new port must stay before it is reported.
    pub debounce_ms: Option<u64>,
}

/// YMODEM transfer behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSection {
    /// Refused data blocks tolerated per transfer.
    pub max_failures: Option<u32>,
    /// Fail instead of closing the session when the budget runs out.
    pub fail_on_exhausted_retries: Option<bool>,
    /// Reject blocks with a bad CRC when receiving.
    pub strict_checksum: Option<bool>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Watcher settings.
    #[serde(default)]
    pub watch: WatchSection,
    /// Transfer settings.
    #[serde(default)]
    pub transfer: TransferSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "fwuploader").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        let conn = other.connection;
        if conn.port.is_some() {
            self.connection.port = conn.port;
        }
        if conn.baud.is_some() {
            self.connection.baud = conn.baud;
        }
        if conn.command_baud.is_some() {
            self.connection.command_baud = conn.command_baud;
        }
        if conn.timeout_ms.is_some() {
            self.connection.timeout_ms = conn.timeout_ms;
        }

        let watch = other.watch;
        if watch.window_ms.is_some() {
            self.watch.window_ms = watch.window_ms;
        }
        if watch.poll_interval_ms.is_some() {
            self.watch.poll_interval_ms = watch.poll_interval_ms;
        }
        if watch.debounce_ms.is_some() {
            self.watch.debounce_ms = watch.debounce_ms;
        }

        if other.transfer.max_failures.is_some() {
            self.transfer.max_failures = other.transfer.max_failures;
        }
        if other.transfer.fail_on_exhausted_retries.is_some() {
            self.transfer.fail_on_exhausted_retries = other.transfer.fail_on_exhausted_retries;
        }
        if other.transfer.strict_checksum.is_some() {
            self.transfer.strict_checksum = other.transfer.strict_checksum;
        }
    }

    /// Read timeout for opened ports.
    pub fn timeout(&self) -> Option<Duration> {
        self.connection.timeout_ms.map(Duration::from_millis)
    }

    /// Watcher timing, defaults filled in.
    pub fn watch_config(&self) -> WatchConfig {
        let mut config = WatchConfig::default();
        if let Some(ms) = self.watch.window_ms {
            config = config.with_window(Duration::from_millis(ms));
        }
        if let Some(ms) = self.watch.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.watch.debounce_ms {
            config = config.with_debounce(Duration::from_millis(ms));
        }
        config
    }

    /// Sender options, defaults filled in.
    pub fn sender_config(&self) -> SenderConfig {
        let mut config = SenderConfig::default();
        if let Some(max) = self.transfer.max_failures {
            config = config.with_max_failures(max);
        }
        if self.transfer.fail_on_exhausted_retries == Some(true) {
            config = config.with_retry_exhaustion(RetryExhaustion::Fail);
        }
        config
    }

    /// Receiver options.
    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig::default()
            .with_strict_checksum(self.transfer.strict_checksum.unwrap_or_default())
    }
}
