//! YMODEM-1K batch file transfer.
//!
//! Used to push certificates to a board running the YMODEM uploader sketch.
//! Every transfer carries exactly one file.
//!
//! ## Block format
//!
//! ```text
//! +-----+-----+------+----------------------+---------+---------+
//! | STX | SEQ | ~SEQ |   DATA (1024 / 128)  | CRC hi  | CRC lo  |
//! +-----+-----+------+----------------------+---------+---------+
//! | 1   | 1   | 1    |        N             | 1       | 1       |
//! +-----+-----+------+----------------------+---------+---------+
//! ```
//!
//! Short data is padded with `0x04`; the CRC covers the padded block.
//!
//! ## Session
//!
//! ```text
//! sender                         receiver
//!   |  <------------------ POLL    |
//!   |  block 0 (name, size) ---->  |
//!   |  <------------------- ACK    |
//!   |  <------------------ POLL    |
//!   |  block 1..n -------------->  |   (each ACKed, NAK/other -> resend)
//!   |  EOT --------------------->  |
//!   |  <------------------- NAK    |
//!   |  EOT --------------------->  |
//!   |  <------------------- ACK    |
//!   |  <------------------ POLL    |
//!   |  block 0 (all zero) ------>  |
//!   |  <------------------- ACK    |
//! ```

mod receiver;
mod sender;

#[cfg(test)]
mod mock;

pub use receiver::{ReceivedFile, ReceiverConfig, YmodemReceiver, parse_header};
pub use sender::{
    RetryExhaustion, SenderConfig, SenderEvent, SenderState, SessionPlan, TransferReport,
    YmodemSender, header_payload,
};

use {
    crate::{
        error::{Error, Result},
        protocol::crc::crc16_with_pad_length,
    },
    std::io::{self, Read},
};

/// YMODEM control characters.
pub mod control {
    /// Start of Header (128-byte block).
    pub const SOH: u8 = 0x01;
    /// Start of Text (1024-byte block).
    pub const STX: u8 = 0x02;
    /// End of Transmission, also the data pad byte.
    pub const EOT: u8 = 0x04;
    /// Acknowledge.
    pub const ACK: u8 = 0x06;
    /// Not Acknowledge.
    pub const NAK: u8 = 0x15;
    /// Receiver ready, CRC mode (`'C'`).
    pub const POLL: u8 = b'C';
}

/// Block size for SOH packets.
pub const SOH_BLOCK_SIZE: usize = 128;

/// Block size for STX packets (YMODEM-1K).
pub const STX_BLOCK_SIZE: usize = 1024;

/// Bytes around the payload: type, sequence, inverse sequence, two CRC bytes.
pub const BLOCK_OVERHEAD: usize = 5;

/// Block size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// 128-byte payload, `SOH`.
    Short,
    /// 1024-byte payload, `STX`.
    Long,
}

impl BlockKind {
    /// Leading control byte.
    pub fn marker(self) -> u8 {
        match self {
            Self::Short => control::SOH,
            Self::Long => control::STX,
        }
    }

    /// Payload length.
    pub fn payload_len(self) -> usize {
        match self {
            Self::Short => SOH_BLOCK_SIZE,
            Self::Long => STX_BLOCK_SIZE,
        }
    }

    /// Kind announced by a leading control byte.
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            control::SOH => Some(Self::Short),
            control::STX => Some(Self::Long),
            _ => None,
        }
    }
}

/// Encode one block.
///
/// `data` longer than the payload is cut; shorter data is padded with `EOT`.
pub fn encode_block(kind: BlockKind, seq: u8, data: &[u8]) -> Vec<u8> {
    let size = kind.payload_len();
    let data = &data[..data.len().min(size)];

    let mut block = Vec::with_capacity(size + BLOCK_OVERHEAD);
    block.push(kind.marker());
    block.push(seq);
    block.push(255 - seq);
    block.extend_from_slice(data);
    block.resize(3 + size, control::EOT);

    let crc = crc16_with_pad_length(data, size);
    block.extend_from_slice(&crc.to_be_bytes());
    block
}

/// Map a failed read to a timeout where the transport ran out of time.
pub(crate) fn read_error(e: io::Error, what: &str) -> Error {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::UnexpectedEof => {
            Error::Timeout(format!("{what}: {e}"))
        },
        _ => Error::Io(e),
    }
}

/// Read a single byte, failing with [`Error::Timeout`] at the transport deadline.
pub(crate) fn read_byte<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<u8> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(1) => return Ok(buf[0]),
            Ok(_) => return Err(Error::Timeout(format!("{what}: no data"))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(read_error(e, what)),
        }
    }
}
