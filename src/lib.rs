//! Logwire: async client for a partitioned append-only message-log broker.
//!
//! Speaks the broker's length-prefixed big-endian wire protocol over one
//! long-lived TCP connection, pipelining requests and demultiplexing
//! replies onto per-request result streams. Five request kinds: produce,
//! multi-produce, fetch, multi-fetch, and offset discovery. A [`Stream`]
//! consumer on top polls batched fetches and keeps per-partition offset
//! cursors.

pub mod client;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod types;

pub use client::{Connection, FetchStream, OffsetsStream};
pub use error::{LogwireError, Result};
pub use protocol::{
    FetchRequest, FetchResponse, Message, MultiFetchRequest, MultiProduceRequest, OffsetsRequest,
    OffsetsResponse, ProduceRequest, Request, RequestKind,
};
pub use stream::{Stream, StreamConfig};
pub use types::{
    ErrorCode, Offset, OffsetTime, Partition, TopicPartition, TopicPartitionOffset,
};
