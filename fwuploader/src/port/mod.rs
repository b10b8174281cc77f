//! Byte transport and port discovery.
//!
//! The protocol layer only needs a blocking, timeout-bounded byte stream, so
//! it is written against the [`Port`] trait rather than a concrete serial
//! port:
//!
//! ```text
//! +-------------------+     +-------------------+
//! |  YMODEM sender /  |     |  board commands   |
//! |     receiver      |     | (reboot, version) |
//! +---------+---------+     +---------+---------+
//!           |                         |
//!           v                         v
//! +---------+-------------------------+---------+
//! |                 Port trait                  |
//! +---------+-------------------------+---------+
//!           |                         |
//!           v                         v
//! +---------+---------+     +---------+---------+
//! |    NativePort     |     |   LoopbackPort    |
//! |   (serialport)    |     |    (in-memory)    |
//! +-------------------+     +-------------------+
//! ```
//!
//! Discovery is split the same way: [`PortEnumerator`] answers "which ports
//! exist right now", and [`watch::PortWatcher`] builds the hot-plug tracking
//! on top of it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fwuploader::port::Port;
//!
//! fn example<P: Port>(port: &mut P) -> std::io::Result<()> {
//!     port.write_all(b"v\n\r")?;
//!
//!     let mut buf = [0u8; 32];
//!     let n = port.read(&mut buf)?;
//!     println!("Received: {:?}", &buf[..n]);
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

pub mod loopback;
pub mod watch;

use log::warn;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate used for board commands (reboot, version query).
pub const COMMAND_BAUD_RATE: u32 = 9600;

/// Baud rate conventionally used for YMODEM transfers.
pub const TRANSFER_BAUD_RATE: u32 = 115200;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Per-read deadline.
    pub timeout: Duration,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: TRANSFER_BAUD_RATE,
            timeout: Duration::from_millis(1000),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Software flow control (XON/XOFF).
    Software,
}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Port with a name and no USB details.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// One-line description for listings.
    pub fn describe(&self) -> String {
        let usb = match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(" [VID:{vid:04X} PID:{pid:04X}]"),
            _ => String::new(),
        };
        let product = self
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();
        format!("{}{usb}{product}", self.name)
    }
}

/// Snapshot of the serial device identifiers present at one instant.
///
/// Each enumeration produces a new set; snapshots are replaced, never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet(BTreeSet<String>);

impl PortSet {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Number of identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Identifiers present here but absent from `earlier`.
    pub fn added_since<'a>(&'a self, earlier: &'a PortSet) -> impl Iterator<Item = &'a str> {
        self.0.difference(&earlier.0).map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PortSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&[PortInfo]> for PortSet {
    fn from(ports: &[PortInfo]) -> Self {
        ports.iter().map(|p| p.name.clone()).collect()
    }
}

/// Blocking byte transport for one serial connection.
///
/// Reads must honour the configured timeout: a read that sees no data before
/// the deadline returns an [`std::io::ErrorKind::TimedOut`] error instead of
/// blocking forever.
pub trait Port: Read + Write + Send {
    /// Get the current per-read deadline.
    fn timeout(&self) -> Duration;

    /// Discard pending input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes and flush.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf)?;
        Write::flush(self)?;
        Ok(())
    }

    /// Run `f` on the port, then close it whatever `f` returns.
    ///
    /// A failure to close is logged; the result of `f` is returned.
    fn run_and_close<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let result = f(self);
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {e}", self.name());
        }
        result
    }
}

/// Lists the serial ports currently known to the OS.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    /// Identifiers of all available ports.
    fn port_set(&self) -> Result<PortSet> {
        Ok(PortSet::from(self.list_ports()?.as_slice()))
    }
}

impl<E: PortEnumerator + ?Sized> PortEnumerator for &E {
    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        (**self).list_ports()
    }
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEnumerator(Vec<PortInfo>);

    impl PortEnumerator for FixedEnumerator {
        fn list_ports(&self) -> Result<Vec<PortInfo>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_port_set_deduplicates() {
        let set: PortSet = ["COM3", "COM4", "COM3"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("COM3"));
        assert!(!set.contains("COM5"));
    }

    #[test]
    fn test_added_since() {
        let before: PortSet = ["/dev/ttyACM0", "/dev/ttyS0"].into_iter().collect();
        let after: PortSet = ["/dev/ttyACM1", "/dev/ttyS0"].into_iter().collect();

        let added: Vec<&str> = after.added_since(&before).collect();
        assert_eq!(added, vec!["/dev/ttyACM1"]);
        assert_eq!(before.added_since(&before).count(), 0);
    }

    #[test]
    fn test_enumerator_port_set() {
        let mut usb = PortInfo::named("/dev/ttyACM0");
        usb.vid = Some(0x2341);
        usb.pid = Some(0x0068);
        let enumerator = FixedEnumerator(vec![usb, PortInfo::named("/dev/ttyS0")]);

        let set = enumerator.port_set().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["/dev/ttyACM0", "/dev/ttyS0"]);
    }

    #[test]
    fn test_port_info_describe() {
        let mut info = PortInfo::named("COM7");
        assert_eq!(info.describe(), "COM7");

        info.vid = Some(0x2341);
        info.pid = Some(0x0368);
        info.product = Some("Portenta C33".to_string());
        assert_eq!(info.describe(), "COM7 [VID:2341 PID:0368] - Portenta C33");
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyACM0", COMMAND_BAUD_RATE)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.port_name, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }
}
