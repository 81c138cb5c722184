//! The five request kinds and their frame encoders.
//!
//! Every request knows its exact on-wire size before encoding; the
//! connection writes `wire_len` as the frame's total length and asserts
//! the byte count afterwards.

use crate::protocol::message::Message;
use crate::protocol::wire;
use crate::types::{Offset, OffsetTime, Partition, TopicPartition, TopicPartitionOffset};
use bytes::{BufMut, BytesMut};

/// Request type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Produce,
    Fetch,
    MultiFetch,
    MultiProduce,
    Offsets,
}

impl RequestKind {
    pub fn as_i16(self) -> i16 {
        match self {
            RequestKind::Produce => 0,
            RequestKind::Fetch => 1,
            RequestKind::MultiFetch => 2,
            RequestKind::MultiProduce => 3,
            RequestKind::Offsets => 4,
        }
    }
}

/// A request that can be framed onto the wire.
pub trait Request {
    fn kind(&self) -> RequestKind;

    /// Size of the body alone.
    fn body_len(&self) -> i32;

    fn encode_body(&self, dst: &mut BytesMut);

    /// Size of type code plus body: the value written as the frame's
    /// total length.
    fn wire_len(&self) -> i32 {
        2 + self.body_len()
    }
}

/// Write a complete frame: total length, type code, body.
pub fn encode_frame(req: &impl Request, dst: &mut BytesMut) {
    dst.put_i32(req.wire_len());
    dst.put_i16(req.kind().as_i16());
    req.encode_body(dst);
}

/// Append messages to one (topic, partition). Fire-and-forget: the
/// protocol defines no produce reply.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub topic: String,
    pub partition: Partition,
    pub messages: Vec<Message>,
}

impl ProduceRequest {
    pub fn new(topic: impl Into<String>, partition: Partition, messages: Vec<Message>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            messages,
        }
    }

    fn message_set_len(&self) -> i32 {
        self.messages.iter().map(Message::wire_len).sum()
    }
}

impl Request for ProduceRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::Produce
    }

    fn body_len(&self) -> i32 {
        // topic, partition, message-set length, message set
        wire::topic_len(&self.topic) + 4 + 4 + self.message_set_len()
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        wire::write_topic(dst, &self.topic);
        dst.put_i32(self.partition);
        dst.put_i32(self.message_set_len());
        for message in &self.messages {
            message.encode(dst);
        }
    }
}

/// Several produce bodies in one frame. The count is a 16-bit field.
#[derive(Debug, Clone)]
pub struct MultiProduceRequest(pub Vec<ProduceRequest>);

impl Request for MultiProduceRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::MultiProduce
    }

    fn body_len(&self) -> i32 {
        2 + self.0.iter().map(ProduceRequest::body_len).sum::<i32>()
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_i16(self.0.len() as i16);
        for req in &self.0 {
            req.encode_body(dst);
        }
    }
}

/// Read up to `max_size` bytes of messages starting at a byte offset.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub topic: String,
    pub partition: Partition,
    pub offset: Offset,
    pub max_size: i32,
}

impl FetchRequest {
    pub fn new(
        topic: impl Into<String>,
        partition: Partition,
        offset: Offset,
        max_size: i32,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            max_size,
        }
    }

    pub(crate) fn target(&self) -> TopicPartitionOffset {
        TopicPartitionOffset::new(self.topic.clone(), self.partition, self.offset)
    }
}

impl Request for FetchRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::Fetch
    }

    fn body_len(&self) -> i32 {
        wire::topic_len(&self.topic) + 4 + 8 + 4
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        wire::write_topic(dst, &self.topic);
        dst.put_i32(self.partition);
        dst.put_i64(self.offset);
        dst.put_i32(self.max_size);
    }
}

/// Several fetch bodies in one frame, answered by one reply holding one
/// message set per subrequest, in order.
#[derive(Debug, Clone)]
pub struct MultiFetchRequest(pub Vec<FetchRequest>);

impl MultiFetchRequest {
    /// The reply omits topic/partition metadata, so the submitter captures
    /// the ordered targets to label decoded records.
    pub(crate) fn targets(&self) -> Vec<TopicPartitionOffset> {
        self.0.iter().map(FetchRequest::target).collect()
    }
}

impl Request for MultiFetchRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::MultiFetch
    }

    fn body_len(&self) -> i32 {
        2 + self.0.iter().map(FetchRequest::body_len).sum::<i32>()
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_i16(self.0.len() as i16);
        for req in &self.0 {
            req.encode_body(dst);
        }
    }
}

/// Ask for up to `max_number` offsets near a time (`Latest` / `Earliest`
/// sentinels or a broker timestamp).
#[derive(Debug, Clone)]
pub struct OffsetsRequest {
    pub topic: String,
    pub partition: Partition,
    pub time: OffsetTime,
    pub max_number: i32,
}

impl OffsetsRequest {
    pub fn new(
        topic: impl Into<String>,
        partition: Partition,
        time: OffsetTime,
        max_number: i32,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            time,
            max_number,
        }
    }

    pub(crate) fn target(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

impl Request for OffsetsRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::Offsets
    }

    fn body_len(&self) -> i32 {
        wire::topic_len(&self.topic) + 4 + 8 + 4
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        wire::write_topic(dst, &self.topic);
        dst.put_i32(self.partition);
        dst.put_i64(self.time.as_i64());
        dst.put_i32(self.max_number);
    }
}
