//! Sending side of a YMODEM-1K session.
//!
//! The session is an explicit state machine. [`SenderState::next`] is the
//! transition table and does no I/O; [`YmodemSender`] performs the action each
//! state calls for (write a block, write `EOT`, or read one control byte) and
//! feeds the outcome back in as a [`SenderEvent`].

use {
    super::{BlockKind, STX_BLOCK_SIZE, control, encode_block, read_byte},
    crate::error::{Result, TransferError},
    log::{debug, trace, warn},
    std::{
        io::{Read, Write},
        path::Path,
        time::Duration,
    },
};

/// What to do once data blocks have been refused `max_failures` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryExhaustion {
    /// Stop sending data and still run the EOT close-out handshake.
    ///
    /// The receiver then ends up with a short file; the returned
    /// [`TransferReport`] has `retries_exhausted` set.
    #[default]
    ProceedToClose,
    /// Abort with [`TransferError::RetriesExhausted`].
    Fail,
}

/// Sender options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Refused data blocks tolerated per session (not per block).
    pub max_failures: u32,
    /// Behaviour once `max_failures` is reached.
    pub on_exhausted: RetryExhaustion,
    /// Pause after writing each data block.
    pub block_delay: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            on_exhausted: RetryExhaustion::default(),
            // USB-CDC drivers on Windows drop data when blocks arrive back to back.
            block_delay: if cfg!(windows) {
                Duration::from_millis(50)
            } else {
                Duration::ZERO
            },
        }
    }
}

impl SenderConfig {
    /// Set the session failure budget.
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Set the behaviour on an exhausted failure budget.
    #[must_use]
    pub fn with_retry_exhaustion(mut self, on_exhausted: RetryExhaustion) -> Self {
        self.on_exhausted = on_exhausted;
        self
    }

    /// Set the pause after each data block.
    #[must_use]
    pub fn with_block_delay(mut self, block_delay: Duration) -> Self {
        self.block_delay = block_delay;
        self
    }
}

/// Fixed parameters of one session, consulted by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    /// Number of 1024-byte data blocks.
    pub total_blocks: usize,
    /// Failure budget.
    pub max_failures: u32,
    /// Behaviour once the budget is spent.
    pub on_exhausted: RetryExhaustion,
}

impl SessionPlan {
    /// Plan for a payload of `payload_len` bytes.
    pub fn new(payload_len: usize, config: &SenderConfig) -> Self {
        Self {
            total_blocks: payload_len.div_ceil(STX_BLOCK_SIZE),
            max_failures: config.max_failures,
            on_exhausted: config.on_exhausted,
        }
    }
}

/// Outcome of the action performed in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderEvent {
    /// The state's write completed.
    Sent,
    /// One byte was read from the receiver.
    Received(u8),
}

/// Sender session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Waiting for the receiver's first POLL.
    AwaitPoll,
    /// Writing the header block (name and size).
    SendHeader,
    /// Waiting for the header ACK.
    AwaitHeaderAck,
    /// Waiting for the POLL that opens the data phase.
    AwaitDataPoll,
    /// Writing data block `block` (0-based).
    SendData {
        /// Block index.
        block: usize,
        /// Refusals so far in this session.
        failures: u32,
    },
    /// Waiting for the ACK of data block `block`.
    AwaitDataAck {
        /// Block index.
        block: usize,
        /// Refusals so far in this session.
        failures: u32,
    },
    /// Writing the first EOT.
    SendFirstEot,
    /// Waiting for the NAK that answers the first EOT.
    AwaitEotNak,
    /// Writing the second EOT.
    SendSecondEot,
    /// Waiting for the ACK of the second EOT.
    AwaitEotAck,
    /// Waiting for the POLL that asks for the next file.
    AwaitEndPoll,
    /// Writing the all-zero end-of-batch block.
    SendEndBlock,
    /// Waiting for the end block ACK.
    AwaitEndAck,
    /// Session finished.
    Done,
}

impl SenderState {
    /// Transition table.
    ///
    /// A write outcome in a waiting state, a byte in a writing state, or any
    /// event after [`SenderState::Done`] is [`TransferError::InvalidTransition`].
    pub fn next(
        self,
        event: SenderEvent,
        plan: &SessionPlan,
    ) -> std::result::Result<Self, TransferError> {
        use {
            SenderEvent::{Received, Sent},
            control::{ACK, NAK, POLL},
        };

        let next = match (self, event) {
            (Self::AwaitPoll, Received(POLL)) => Self::SendHeader,
            (Self::AwaitPoll, Received(b)) => return Err(TransferError::NotPolled(b)),

            (Self::SendHeader, Sent) => Self::AwaitHeaderAck,
            (Self::AwaitHeaderAck, Received(ACK)) => Self::AwaitDataPoll,
            (Self::AwaitHeaderAck, Received(b)) => return Err(TransferError::HeaderRejected(b)),

            (Self::AwaitDataPoll, Received(POLL)) if plan.total_blocks == 0 => Self::SendFirstEot,
            (Self::AwaitDataPoll, Received(POLL)) => Self::SendData {
                block: 0,
                failures: 0,
            },
            (Self::AwaitDataPoll, Received(b)) => return Err(TransferError::NotPolled(b)),

            (Self::SendData { block, failures }, Sent) => Self::AwaitDataAck { block, failures },
            (Self::AwaitDataAck { block, failures }, Received(ACK)) => {
                if block + 1 < plan.total_blocks {
                    Self::SendData {
                        block: block + 1,
                        failures,
                    }
                } else {
                    Self::SendFirstEot
                }
            },
            (Self::AwaitDataAck { block, failures }, Received(_)) => {
                let failures = failures + 1;
                if failures < plan.max_failures {
                    Self::SendData { block, failures }
                } else {
                    match plan.on_exhausted {
                        RetryExhaustion::ProceedToClose => Self::SendFirstEot,
                        RetryExhaustion::Fail => {
                            return Err(TransferError::RetriesExhausted { failures });
                        },
                    }
                }
            },

            (Self::SendFirstEot, Sent) => Self::AwaitEotNak,
            (Self::AwaitEotNak, Received(NAK)) => Self::SendSecondEot,
            (Self::AwaitEotNak, Received(b)) => return Err(TransferError::EotNotAcknowledged(b)),

            (Self::SendSecondEot, Sent) => Self::AwaitEotAck,
            (Self::AwaitEotAck, Received(ACK)) => Self::AwaitEndPoll,
            (Self::AwaitEotAck, Received(b)) => return Err(TransferError::EndHandshakeFailed(b)),

            (Self::AwaitEndPoll, Received(POLL)) => Self::SendEndBlock,
            (Self::AwaitEndPoll, Received(b)) => return Err(TransferError::EndHandshakeFailed(b)),

            (Self::SendEndBlock, Sent) => Self::AwaitEndAck,
            (Self::AwaitEndAck, Received(ACK)) => Self::Done,
            (Self::AwaitEndAck, Received(b)) => return Err(TransferError::EndBlockRejected(b)),

            (state, event) => {
                return Err(TransferError::InvalidTransition {
                    state: format!("{state:?}"),
                    event: format!("{event:?}"),
                });
            },
        };
        Ok(next)
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Payload size announced in the header.
    pub bytes: usize,
    /// Data blocks the payload was split into.
    pub blocks: usize,
    /// Data blocks the receiver acknowledged.
    pub blocks_acked: usize,
    /// Refused data blocks over the whole session.
    pub failures: u32,
    /// Data phase was cut short by the failure budget.
    pub retries_exhausted: bool,
}

impl TransferReport {
    /// Whether every data block was acknowledged.
    pub fn is_complete(&self) -> bool {
        self.blocks_acked == self.blocks && !self.retries_exhausted
    }
}

/// Build the header block payload: `basename NUL size`, zero padded.
pub fn header_payload(filename: &str, size: usize) -> std::result::Result<Vec<u8>, TransferError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let mut payload = Vec::with_capacity(STX_BLOCK_SIZE);
    payload.extend_from_slice(name.as_bytes());
    payload.push(0x00);
    payload.extend_from_slice(size.to_string().as_bytes());

    if payload.len() > STX_BLOCK_SIZE {
        return Err(TransferError::HeaderTooLong {
            filename: name.to_string(),
            len: payload.len(),
            max: STX_BLOCK_SIZE,
        });
    }
    payload.resize(STX_BLOCK_SIZE, 0x00);
    Ok(payload)
}

/// Wire sequence number of data block `block`.
fn sequence_of(block: usize) -> u8 {
    (block.wrapping_add(1) % 256) as u8
}

/// YMODEM sender over a borrowed transport.
pub struct YmodemSender<'a, P: Read + Write> {
    port: &'a mut P,
    config: SenderConfig,
}

impl<'a, P: Read + Write> YmodemSender<'a, P> {
    /// Create a sender with default configuration.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            config: SenderConfig::default(),
        }
    }

    /// Create a sender with custom configuration.
    pub fn with_config(port: &'a mut P, config: SenderConfig) -> Self {
        Self { port, config }
    }

    /// Send `data` as `filename`.
    ///
    /// The transport must be open and the receiver about to send its first
    /// POLL.
    pub fn send(&mut self, data: &[u8], filename: &str) -> Result<TransferReport> {
        self.send_with_progress(data, filename, |_, _| {})
    }

    /// Send `data` as `filename`, reporting `(bytes_acked, total)` after
    /// every acknowledged data block.
    pub fn send_with_progress<F>(
        &mut self,
        data: &[u8],
        filename: &str,
        mut progress: F,
    ) -> Result<TransferReport>
    where
        F: FnMut(usize, usize),
    {
        let header = header_payload(filename, data.len())?;
        let plan = SessionPlan::new(data.len(), &self.config);
        let mut report = TransferReport {
            bytes: data.len(),
            blocks: plan.total_blocks,
            ..TransferReport::default()
        };

        debug!(
            "Starting YMODEM send: {filename} ({} bytes, {} blocks)",
            data.len(),
            plan.total_blocks
        );

        let mut state = SenderState::AwaitPoll;
        while state != SenderState::Done {
            let event = self.perform(state, data, &header)?;

            if let (SenderState::AwaitDataAck { block, failures }, SenderEvent::Received(byte)) =
                (state, event)
            {
                if byte == control::ACK {
                    report.blocks_acked = block + 1;
                    progress(((block + 1) * STX_BLOCK_SIZE).min(data.len()), data.len());
                } else {
                    report.failures = failures + 1;
                    warn!(
                        "Block {} refused with 0x{byte:02X} ({}/{} failures)",
                        block + 1,
                        report.failures,
                        plan.max_failures
                    );
                }
            }

            let next = state.next(event, &plan)?;
            trace!("{state:?} -> {next:?}");

            if next == SenderState::SendFirstEot && report.blocks_acked < plan.total_blocks {
                report.retries_exhausted = true;
                warn!(
                    "Giving up on data after {} failures, {}/{} blocks sent",
                    report.failures, report.blocks_acked, plan.total_blocks
                );
            }
            state = next;
        }

        debug!("YMODEM send complete");
        Ok(report)
    }

    /// Carry out the action of `state`.
    fn perform(&mut self, state: SenderState, data: &[u8], header: &[u8]) -> Result<SenderEvent> {
        match state {
            SenderState::SendHeader => {
                trace!("Sending header block");
                self.write(&encode_block(BlockKind::Long, 0, header))?;
            },
            SenderState::SendData { block, .. } => {
                let start = block * STX_BLOCK_SIZE;
                let end = (start + STX_BLOCK_SIZE).min(data.len());
                trace!("Sending block {} ({} bytes)", block + 1, end - start);
                self.write(&encode_block(
                    BlockKind::Long,
                    sequence_of(block),
                    &data[start..end],
                ))?;
                if !self.config.block_delay.is_zero() {
                    std::thread::sleep(self.config.block_delay);
                }
            },
            SenderState::SendFirstEot | SenderState::SendSecondEot => {
                trace!("Sending EOT");
                self.write(&[control::EOT])?;
            },
            SenderState::SendEndBlock => {
                trace!("Sending end block");
                self.write(&encode_block(BlockKind::Long, 0, &[0u8; STX_BLOCK_SIZE]))?;
            },
            waiting => {
                let byte = read_byte(self.port, &format!("{waiting:?}"))?;
                trace!("Received 0x{byte:02X} in {waiting:?}");
                return Ok(SenderEvent::Received(byte));
            },
        }
        Ok(SenderEvent::Sent)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}
