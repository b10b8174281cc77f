//! Scripted serial port for protocol tests.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

/// Mock serial port with separate read/write buffers.
///
/// Unlike `Cursor<Vec<u8>>`, this keeps reads and writes independent. Reads
/// drain the scripted response and time out once it is used up.
pub(crate) struct MockSerial {
    pub(crate) read_buf: VecDeque<u8>,
    pub(crate) write_buf: Vec<u8>,
}

impl MockSerial {
    pub(crate) fn new(response: &[u8]) -> Self {
        Self {
            read_buf: response.iter().copied().collect(),
            write_buf: Vec::new(),
        }
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.read_buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.read_buf.len());
        for (dst, src) in buf.iter_mut().zip(self.read_buf.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
