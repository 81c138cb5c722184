//! Error types for the client.

use crate::types::{ErrorCode, Partition};
use thiserror::Error;

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, LogwireError>;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug)]
pub enum LogwireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection died while this request was outstanding. Every
    /// waiter on a torn-down connection receives one of these.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Submitting on a connection whose engine has already shut down.
    #[error("connection closed")]
    Closed,

    /// Top-level error code on a reply frame.
    #[error("broker error: {0}")]
    Broker(ErrorCode),

    /// Per-subrequest error code inside a multi-fetch reply, labeled with
    /// the subrequest it belongs to.
    #[error("broker error for {topic}/{partition}: {code}")]
    PartitionBroker {
        topic: String,
        partition: Partition,
        code: ErrorCode,
    },

    #[error("unsupported message format {0} (only format 1 is supported)")]
    BadMagic(i8),

    #[error("unsupported compression {0} (only uncompressed payloads are supported)")]
    BadCompression(i8),

    #[error("message checksum mismatch: header {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    #[error("protocol error: {0}")]
    Protocol(String),
}
