//! # fwuploader
//!
//! Serial transfer core for pushing files to development boards.
//!
//! This crate provides:
//!
//! - A byte transport abstraction over native serial ports, plus an in-memory
//!   loopback pair
//! - Port enumeration and hot-plug tracking across USB re-enumeration
//! - YMODEM-1K sender and receiver
//! - CRC16-XMODEM checksum calculation
//! - Helper sketch commands (reboot, firmware version)
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for port listings
//!
//! ## Example
//!
//! ```rust,no_run
//! use fwuploader::{
//!     NativePort, NativePortEnumerator, SerialConfig, YmodemSender,
//!     command::{Command, send_command_and_close},
//!     port::{COMMAND_BAUD_RATE, watch::PortWatcher},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watcher = PortWatcher::new(NativePortEnumerator);
//!     let baseline = watcher.snapshot()?;
//!
//!     // Reboot the board; it comes back under a new name.
//!     let port = NativePort::open(&SerialConfig::new("/dev/ttyACM0", COMMAND_BAUD_RATE))?;
//!     send_command_and_close(port, Command::Reboot)?;
//!
//!     let Some(name) = watcher.await_new_port(&baseline)? else {
//!         return Err("board did not come back".into());
//!     };
//!
//!     let cert = std::fs::read("roots.pem")?;
//!     NativePort::with_port(&SerialConfig::new(name, 115200), |port| {
//!         YmodemSender::new(port).send(&cert, "roots.pem")
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod port;
pub mod protocol;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    command::{Command, parse_version_reply, query_firmware_version, send_command_and_close},
    error::{Error, ProtocolError, Result, TransferError},
    port::{
        Port, PortEnumerator, PortInfo, PortSet, SerialConfig,
        watch::{PortWatcher, WatchConfig},
    },
    protocol::{
        ReceivedFile, ReceiverConfig, RetryExhaustion, SenderConfig, TransferReport,
        YmodemReceiver, YmodemSender, crc16, crc16_with_pad_length,
    },
};
