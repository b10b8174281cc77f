//! Protocol implementations.

pub mod crc;
pub mod ymodem;

// Re-export common types
pub use crc::{crc16, crc16_with_pad_length};
pub use ymodem::{
    ReceivedFile, ReceiverConfig, RetryExhaustion, SenderConfig, SenderState, TransferReport,
    YmodemReceiver, YmodemSender,
};
