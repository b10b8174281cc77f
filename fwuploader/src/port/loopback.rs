//! In-memory duplex transport.
//!
//! [`pair`] returns two connected ends: bytes written to one are read from the
//! other. Reads honour the per-port timeout just like a serial port, which
//! makes the pair suitable for running a sender and a receiver on two
//! threads without hardware.

use {
    crate::{error::Result, port::Port},
    std::{
        collections::VecDeque,
        io::{self, Read, Write},
        sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
        time::Duration,
    },
};

/// One end of an in-memory duplex pipe.
pub struct LoopbackPort {
    name: String,
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

/// Create two connected loopback ports with the given read timeout.
pub fn pair(timeout: Duration) -> (LoopbackPort, LoopbackPort) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        LoopbackPort::new("loopback-a", a_tx, a_rx, timeout),
        LoopbackPort::new("loopback-b", b_tx, b_rx, timeout),
    )
}

impl LoopbackPort {
    fn new(name: &str, tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            tx: Some(tx),
            rx,
            pending: VecDeque::new(),
            timeout,
        }
    }
}

impl Read for LoopbackPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "loopback read timed out"));
                },
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "loopback peer closed",
                    ));
                },
            }
        }

        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for LoopbackPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))?;
        if buf.is_empty() {
            return Ok(0);
        }
        tx.send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "loopback peer closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for LoopbackPort {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.pending.clear();
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}
