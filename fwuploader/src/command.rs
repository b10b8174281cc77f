//! Commands understood by the board's helper sketch.
//!
//! The sketch listens at [`COMMAND_BAUD_RATE`](crate::port::COMMAND_BAUD_RATE)
//! and reacts to short, line-terminated commands.

use {
    crate::{
        error::{Error, ProtocolError, Result},
        port::Port,
        protocol::ymodem::read_error,
    },
    log::{debug, trace},
    std::io::{BufRead, BufReader},
};

/// Marker line that ends the version reply.
const VERSION_REPLY_END: &str = "Check result";

/// A board command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reboot into the bootloader. The USB port re-enumerates.
    Reboot,
    /// Print the firmware version.
    Version,
}

impl Command {
    /// Bytes written to the port.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Reboot => b"r\n\r",
            Self::Version => b"v\n\r",
        }
    }
}

/// Write `command` to `port`.
pub fn send_command<P: Port + ?Sized>(port: &mut P, command: Command) -> Result<()> {
    debug!("Sending {command:?} to {}", port.name());
    port.write_all_bytes(command.as_bytes())
}

/// Write `command` and close the port.
///
/// Used for commands after which the board drops off the bus.
pub fn send_command_and_close<P: Port>(mut port: P, command: Command) -> Result<()> {
    send_command(&mut port, command)?;
    port.close()
}

/// Ask the board for its firmware version.
///
/// Stale input is dropped first. Reply lines are then read until the closing
/// marker; if the board goes quiet before sending it, whatever arrived is
/// parsed. Silence from the start is [`Error::Timeout`].
pub fn query_firmware_version<P: Port + ?Sized>(port: &mut P) -> Result<String> {
    port.clear_buffers()?;
    send_command(port, Command::Version)?;

    let timeout = port.timeout();
    let mut reply = String::new();
    let mut reader = BufReader::new(&mut *port);
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line);
        if !line.is_empty() {
            trace!("Version reply line: {:?}", line.trim_end());
            reply.push_str(line.trim_end_matches(['\r', '\n']));
            reply.push('\n');
        }

        match read {
            Ok(0) => break,
            Ok(_) if reply.contains(VERSION_REPLY_END) => break,
            Ok(_) => {},
            Err(e) => match read_error(e, "firmware version reply") {
                Error::Timeout(_) if !reply.is_empty() => {
                    debug!("No {VERSION_REPLY_END:?} line after {timeout:?} of silence");
                    break;
                },
                err => return Err(err),
            },
        }
    }

    Ok(parse_version_reply(&reply)?)
}

/// Extract the version from a reply: the text after the first `:` on the
/// third line.
pub fn parse_version_reply(reply: &str) -> std::result::Result<String, ProtocolError> {
    let line = reply
        .split('\n')
        .nth(2)
        .ok_or_else(|| ProtocolError::MalformedVersionReply(reply.to_string()))?;
    let (_, version) = line
        .split_once(':')
        .ok_or_else(|| ProtocolError::MalformedVersionReply(reply.to_string()))?;

    let version = version.trim();
    if version.is_empty() {
        return Err(ProtocolError::MalformedVersionReply(reply.to_string()));
    }
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::port::loopback::{self, LoopbackPort},
        std::{io::Read, thread, time::Duration},
    };

    const REPLY: &str =
        "\r\nPortenta C33 uploader\r\nFirmware version: 0.3.1\r\nCheck result: OK\r\n";

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::Reboot.as_bytes(), b"r\n\r");
        assert_eq!(Command::Version.as_bytes(), b"v\n\r");
    }

    #[test]
    fn test_parse_version_reply() {
        assert_eq!(parse_version_reply("\nboard\nFirmware version: 1.2.0\n").unwrap(), "1.2.0");
        assert_eq!(parse_version_reply("a\nb\nv:2:x\n").unwrap(), "2:x");
    }

    #[test]
    fn test_parse_version_reply_malformed() {
        for reply in ["", "one\ntwo", "a\nb\nno colon\n", "a\nb\nversion:   \n"] {
            assert!(
                matches!(
                    parse_version_reply(reply),
                    Err(ProtocolError::MalformedVersionReply(_))
                ),
                "{reply:?}"
            );
        }
    }

    /// Board that answers the version command with `reply`, then stays
    /// connected but silent.
    fn spawn_board(
        mut board: LoopbackPort,
        reply: &'static str,
    ) -> thread::JoinHandle<LoopbackPort> {
        thread::spawn(move || {
            let mut sent = [0u8; 3];
            board.read_exact(&mut sent).unwrap();
            assert_eq!(&sent, b"v\n\r");
            board.write_all_bytes(reply.as_bytes()).unwrap();
            board
        })
    }

    #[test]
    fn test_query_firmware_version() {
        let (mut host, board) = loopback::pair(Duration::from_millis(200));
        let board = spawn_board(board, REPLY);

        assert_eq!(query_firmware_version(&mut host).unwrap(), "0.3.1");
        board.join().unwrap();
    }

    #[test]
    fn test_query_firmware_version_without_marker() {
        let (mut host, board) = loopback::pair(Duration::from_millis(200));
        let board = spawn_board(
            board,
            "\r\nPortenta C33 uploader\r\nFirmware version: 0.3.1\r\n",
        );

        assert_eq!(query_firmware_version(&mut host).unwrap(), "0.3.1");
        board.join().unwrap();
    }

    #[test]
    fn test_query_firmware_version_short_reply_is_malformed() {
        let (mut host, board) = loopback::pair(Duration::from_millis(200));
        let board = spawn_board(board, "\r\nPortenta C33 uploader\r\n");

        let err = query_firmware_version(&mut host).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MalformedVersionReply(_))
        ));
        board.join().unwrap();
    }

    #[test]
    fn test_query_firmware_version_drops_stale_input() {
        let (mut host, mut board) = loopback::pair(Duration::from_millis(200));
        board.write_all_bytes(b"boot banner\r\n").unwrap();
        let board = spawn_board(board, REPLY);

        assert_eq!(query_firmware_version(&mut host).unwrap(), "0.3.1");
        board.join().unwrap();
    }

    #[test]
    fn test_query_firmware_version_silent_board() {
        let (mut host, _board) = loopback::pair(Duration::from_millis(20));

        let err = query_firmware_version(&mut host).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_send_command_and_close() {
        let (host, mut board) = loopback::pair(Duration::from_millis(50));

        send_command_and_close(host, Command::Reboot).unwrap();

        let mut sent = [0u8; 3];
        board.read_exact(&mut sent).unwrap();
        assert_eq!(&sent, b"r\n\r");
        // The host end is gone.
        assert!(board.read(&mut sent).is_err());
    }
}
