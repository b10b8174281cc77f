//! Error types for fwuploader.

use std::io;
use thiserror::Error;

/// Result type for fwuploader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fwuploader operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the byte transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The OS serial port listing failed.
    #[error("Port enumeration failed: {0}")]
    Enumeration(String),

    /// A read did not complete before the transport deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Framing or content error while receiving.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote end deviated from the expected transfer handshake.
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// CRC checksum mismatch.
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC carried by the packet.
        expected: u16,
        /// CRC computed over the received payload.
        actual: u16,
    },
}

/// Receive-side framing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Sequence and inverse-sequence bytes do not add up to 255.
    #[error("invalid packet: sequence {sequence:#04x}, inverse {inverse:#04x}")]
    InvalidPacket {
        /// Sequence byte as received.
        sequence: u8,
        /// Inverse-sequence byte as received.
        inverse: u8,
    },

    /// Leading packet byte is none of SOH, STX or EOT.
    #[error("unexpected packet type {0:#04x}")]
    UnexpectedPacketType(u8),

    /// Header block does not carry `name NUL size`.
    #[error("malformed header block: {0}")]
    MalformedHeader(String),

    /// Fewer payload bytes arrived than the header declared.
    #[error("transfer truncated: header declared {declared} bytes, received {received}")]
    Truncated {
        /// Size from the header block.
        declared: usize,
        /// Bytes accumulated from data blocks.
        received: usize,
    },

    /// A control byte other than the expected one arrived.
    #[error("expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedByte {
        /// Control byte the protocol called for.
        expected: u8,
        /// Byte actually read.
        actual: u8,
    },

    /// Firmware version reply could not be parsed.
    #[error("malformed version reply: {0:?}")]
    MalformedVersionReply(String),
}

/// Send-side handshake errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Receiver did not signal readiness with POLL.
    #[error("receiver not ready: expected POLL, got {0:#04x}")]
    NotPolled(u8),

    /// Header block was not acknowledged.
    #[error("header block rejected: {0:#04x}")]
    HeaderRejected(u8),

    /// File name and size do not fit in one header block.
    #[error("header for {filename:?} needs {len} bytes, block holds {max}")]
    HeaderTooLong {
        /// Name that was to be sent.
        filename: String,
        /// Encoded header length.
        len: usize,
        /// Block payload size.
        max: usize,
    },

    /// First EOT was not answered with NAK.
    #[error("expected NAK after first EOT, got {0:#04x}")]
    EotNotAcknowledged(u8),

    /// Second EOT was not answered with ACK.
    #[error("end handshake failed: expected ACK after second EOT, got {0:#04x}")]
    EndHandshakeFailed(u8),

    /// End-of-batch block was refused or not requested.
    #[error("end block not accepted: {0:#04x}")]
    EndBlockRejected(u8),

    /// The session produced an event its current state cannot consume.
    #[error("sender state {state} cannot handle {event}")]
    InvalidTransition {
        /// State the session was in.
        state: String,
        /// Event that arrived.
        event: String,
    },

    /// Data block acknowledgements failed too often.
    #[error("gave up after {failures} unacknowledged data blocks")]
    RetriesExhausted {
        /// Failure count when the transfer stopped.
        failures: u32,
    },
}
