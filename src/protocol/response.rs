//! Decoded reply records delivered on result streams.

use crate::error::Result;
use crate::protocol::wire;
use crate::types::{Offset, Partition, TopicPartition, TopicPartitionOffset};
use bytes::{Bytes, BytesMut};

/// One fetched message. `offset` is the position *after* this message:
/// the value to pass to the next fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub topic: String,
    pub partition: Partition,
    pub offset: Offset,
    /// Zero-copy slice of the reply buffer. Holding it pins that buffer;
    /// copy the bytes out if you retain messages long-term.
    pub payload: Bytes,
}

/// Reply to an offsets request, labeled with the target it was asked for
/// (the reply itself carries only bare offsets).
#[derive(Debug, Clone)]
pub struct OffsetsResponse {
    pub offsets: Vec<TopicPartitionOffset>,
}

/// Parse an offsets reply body: `count (4) | offset (8) * count`.
pub(crate) fn decode_offsets_body(
    buf: &mut BytesMut,
    target: &TopicPartition,
) -> Result<OffsetsResponse> {
    let count = wire::read_i32(buf)?;
    let mut offsets = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let offset = wire::read_i64(buf)?;
        offsets.push(target.clone().at(offset));
    }
    Ok(OffsetsResponse { offsets })
}
