//! Core protocol types shared across the client.

use std::fmt;

/// Partition id within a topic. Valid requests use values >= 0.
pub type Partition = i32;

/// Byte position within a partition's log. Used both to address the next
/// byte to read and to report the position after a consumed message.
pub type Offset = i64;

/// A (topic, partition) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: Partition,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: Partition) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    pub fn at(self, offset: Offset) -> TopicPartitionOffset {
        TopicPartitionOffset {
            topic: self.topic,
            partition: self.partition,
            offset,
        }
    }
}

/// The universal addressing triple: topic, partition, byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: Partition,
    pub offset: Offset,
}

impl TopicPartitionOffset {
    pub fn new(topic: impl Into<String>, partition: Partition, offset: Offset) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition {
            topic: self.topic.clone(),
            partition: self.partition,
        }
    }
}

/// Broker error codes carried on every reply frame (signed 16-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown,
    None,
    OffsetOutOfRange,
    InvalidMessage,
    WrongPartition,
    InvalidFetchSize,
}

impl ErrorCode {
    /// Map a wire code to a known error; anything unrecognized is `Unknown`.
    pub fn from_i16(code: i16) -> Self {
        match code {
            0 => ErrorCode::None,
            1 => ErrorCode::OffsetOutOfRange,
            2 => ErrorCode::InvalidMessage,
            3 => ErrorCode::WrongPartition,
            4 => ErrorCode::InvalidFetchSize,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            ErrorCode::Unknown => -1,
            ErrorCode::None => 0,
            ErrorCode::OffsetOutOfRange => 1,
            ErrorCode::InvalidMessage => 2,
            ErrorCode::WrongPartition => 3,
            ErrorCode::InvalidFetchSize => 4,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorCode::Unknown => "unknown error",
            ErrorCode::None => "success",
            ErrorCode::OffsetOutOfRange => {
                "offset requested is no longer available on the server"
            }
            ErrorCode::InvalidMessage => "a message failed its checksum and is corrupt",
            ErrorCode::WrongPartition => {
                "partition does not exist (not between 0 and num_partitions - 1)"
            }
            ErrorCode::InvalidFetchSize => {
                "requested fetch size is smaller than the message being fetched"
            }
        };
        f.write_str(msg)
    }
}

/// Sentinel times accepted by an offsets request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetTime {
    /// The offset just past the newest message (-1 on the wire).
    Latest,
    /// The oldest retained offset (-2 on the wire).
    Earliest,
    /// An explicit broker timestamp.
    At(i64),
}

impl OffsetTime {
    pub fn as_i64(self) -> i64 {
        match self {
            OffsetTime::Latest => -1,
            OffsetTime::Earliest => -2,
            OffsetTime::At(t) => t,
        }
    }
}

/// Message format with the compression field (the only format this client
/// accepts).
pub const MAGIC_WITH_COMPRESSION: i8 = 1;
/// The pre-compression-field format. Recognized, never accepted.
pub const MAGIC_WITHOUT_COMPRESSION: i8 = 0;

/// Compression tags. Only `COMPRESSION_NONE` is supported; the others are
/// reserved by the protocol.
pub const COMPRESSION_NONE: i8 = 0;
pub const COMPRESSION_GZIP: i8 = 1;
pub const COMPRESSION_SNAPPY: i8 = 2;

/// Message header past the length field: magic + compression + crc.
pub const MESSAGE_HEADER_SIZE: i32 = 6;
/// Message header including the length field itself.
pub const MESSAGE_FULL_HEADER_SIZE: i32 = 10;
