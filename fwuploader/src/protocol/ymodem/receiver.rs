//! Receiving side of a YMODEM-1K session (single file).

use {
    super::{BlockKind, control, read_byte, read_error},
    crate::{
        error::{Error, ProtocolError, Result},
        protocol::crc::crc16,
    },
    byteorder::{BigEndian, ReadBytesExt},
    log::{debug, trace, warn},
    std::io::{Read, Write},
};

/// Receiver options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Reject blocks with a bad CRC and wait for the resend.
    ///
    /// When `false` a bad block is answered with NAK followed by ACK and its
    /// payload is kept.
    pub strict_checksum: bool,
}

impl ReceiverConfig {
    /// Set the checksum policy.
    #[must_use]
    pub fn with_strict_checksum(mut self, strict: bool) -> Self {
        self.strict_checksum = strict;
        self
    }
}

/// A file taken off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Name from the header block.
    pub filename: String,
    /// Payload cut to the size from the header block.
    pub data: Vec<u8>,
}

/// Split a header block payload into file name and declared size.
///
/// Anything after the size digits (modification time, mode) is ignored.
pub fn parse_header(payload: &[u8]) -> std::result::Result<(String, usize), ProtocolError> {
    let nul = payload
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ProtocolError::MalformedHeader("no NUL after file name".into()))?;
    let filename = String::from_utf8_lossy(&payload[..nul]).into_owned();

    let rest = &payload[nul + 1..];
    let start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());
    let digits: Vec<u8> = rest[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    if digits.is_empty() {
        return Err(ProtocolError::MalformedHeader(format!(
            "no file size after {filename:?}"
        )));
    }

    let size = String::from_utf8_lossy(&digits)
        .parse::<usize>()
        .map_err(|e| ProtocolError::MalformedHeader(format!("file size: {e}")))?;
    Ok((filename, size))
}

/// YMODEM receiver over a borrowed transport.
pub struct YmodemReceiver<'a, P: Read + Write> {
    port: &'a mut P,
    config: ReceiverConfig,
}

impl<'a, P: Read + Write> YmodemReceiver<'a, P> {
    /// Create a receiver with the permissive checksum policy.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            config: ReceiverConfig::default(),
        }
    }

    /// Create a receiver with custom configuration.
    pub fn with_config(port: &'a mut P, config: ReceiverConfig) -> Self {
        Self { port, config }
    }

    /// Receive one file.
    pub fn receive(&mut self) -> Result<ReceivedFile> {
        debug!("Starting YMODEM receive");
        self.write(control::POLL)?;

        let header = self
            .receive_packet()?
            .ok_or_else(|| ProtocolError::MalformedHeader("EOT instead of header block".into()))?;
        let (filename, declared) = parse_header(&header)?;
        debug!("Receiving {filename:?} ({declared} bytes)");

        self.write(control::POLL)?;

        let mut data = Vec::with_capacity(declared);
        loop {
            match self.receive_packet() {
                Ok(Some(payload)) => {
                    data.extend_from_slice(&payload);
                    trace!("{} bytes received", data.len());
                },
                Ok(None) => break,
                Err(Error::Protocol(ProtocolError::InvalidPacket { sequence, inverse })) => {
                    warn!("Dropping packet with sequence {sequence:#04x}/{inverse:#04x}");
                },
                Err(Error::CrcMismatch { .. }) if self.config.strict_checksum => {},
                Err(e) => return Err(e),
            }
        }

        // First EOT already consumed; ask for the second.
        self.write(control::NAK)?;
        let byte = read_byte(self.port, "second EOT")?;
        if byte != control::EOT {
            return Err(ProtocolError::UnexpectedByte {
                expected: control::EOT,
                actual: byte,
            }
            .into());
        }
        self.write(control::ACK)?;

        self.write(control::POLL)?;
        self.receive_packet()?;

        if data.len() < declared {
            return Err(ProtocolError::Truncated {
                declared,
                received: data.len(),
            }
            .into());
        }
        data.truncate(declared);

        debug!("YMODEM receive complete: {filename:?}");
        Ok(ReceivedFile { filename, data })
    }

    /// Read one packet and answer it.
    ///
    /// Returns `Ok(None)` when the packet is a bare `EOT`, which is left
    /// unanswered for the caller.
    pub fn receive_packet(&mut self) -> Result<Option<Vec<u8>>> {
        let marker = read_byte(self.port, "packet type")?;
        if marker == control::EOT {
            trace!("EOT received");
            return Ok(None);
        }
        let Some(kind) = BlockKind::from_marker(marker) else {
            self.write(control::NAK)?;
            return Err(ProtocolError::UnexpectedPacketType(marker).into());
        };

        let sequence = read_byte(self.port, "packet sequence")?;
        let inverse = read_byte(self.port, "packet inverse sequence")?;
        if u16::from(sequence) + u16::from(inverse) != 255 {
            self.write(control::NAK)?;
            return Err(ProtocolError::InvalidPacket { sequence, inverse }.into());
        }

        let mut payload = vec![0u8; kind.payload_len()];
        self.port
            .read_exact(&mut payload)
            .map_err(|e| read_error(e, "packet payload"))?;
        let expected = self
            .port
            .read_u16::<BigEndian>()
            .map_err(|e| read_error(e, "packet CRC"))?;

        let actual = crc16(&payload);
        if actual != expected {
            warn!("CRC mismatch on packet {sequence}: expected {expected:#06x}, got {actual:#06x}");
            self.write(control::NAK)?;
            if self.config.strict_checksum {
                return Err(Error::CrcMismatch { expected, actual });
            }
        }

        self.write(control::ACK)?;
        trace!("Packet {sequence} accepted ({} bytes)", payload.len());
        Ok(Some(payload))
    }

    fn write(&mut self, byte: u8) -> Result<()> {
        self.port.write_all(&[byte])?;
        self.port.flush()?;
        Ok(())
    }
}
