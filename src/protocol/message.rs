//! A single message record: opaque payload behind a
//! `length | magic | compression | crc` header.

use crate::error::{LogwireError, Result};
use crate::protocol::wire;
use crate::types::{
    COMPRESSION_NONE, MAGIC_WITH_COMPRESSION, MESSAGE_FULL_HEADER_SIZE, MESSAGE_HEADER_SIZE,
};
use bytes::{BufMut, Bytes, BytesMut};

/// An opaque message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(Bytes);

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    pub fn payload(&self) -> &[u8] {
        &self.0
    }

    /// On-wire size including the length field.
    pub(crate) fn wire_len(&self) -> i32 {
        MESSAGE_FULL_HEADER_SIZE + self.0.len() as i32
    }

    /// Write the record: length (excluding itself), magic 1, no
    /// compression, CRC32-IEEE of the payload, then the payload.
    pub(crate) fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(MESSAGE_HEADER_SIZE + self.0.len() as i32);
        dst.put_i8(MAGIC_WITH_COMPRESSION);
        dst.put_i8(COMPRESSION_NONE);
        dst.put_u32(crc32fast::hash(&self.0));
        dst.extend_from_slice(&self.0);
    }
}

impl From<&[u8]> for Message {
    fn from(payload: &[u8]) -> Self {
        Message(Bytes::copy_from_slice(payload))
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Message(Bytes::from(payload))
    }
}

/// Pull the next record off a message-set buffer.
///
/// Returns `None` when the buffer is empty (clean end of the set) and
/// `Some((payload, length_field))` otherwise, where `payload` is a
/// zero-copy slice of `buf` and `length_field` is the record's on-wire
/// length (excluding its own 4 bytes) for offset accounting. Anything
/// short of a whole valid record is an error: sets end at record
/// boundaries or not at all.
pub(crate) fn decode_next(buf: &mut BytesMut) -> Result<Option<(Bytes, i32)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let length = wire::read_i32(buf)?;
    if length < MESSAGE_HEADER_SIZE {
        return Err(LogwireError::Protocol(format!(
            "message length {} below header size {}",
            length, MESSAGE_HEADER_SIZE
        )));
    }
    let payload_len = (length - MESSAGE_HEADER_SIZE) as usize;

    let magic = wire::read_i8(buf)?;
    let compression = wire::read_i8(buf)?;
    let crc = wire::read_u32(buf)?;
    if buf.len() < payload_len {
        return Err(LogwireError::Protocol(format!(
            "message payload truncated: need {} bytes, have {}",
            payload_len,
            buf.len()
        )));
    }
    let payload = buf.split_to(payload_len).freeze();

    if magic != MAGIC_WITH_COMPRESSION {
        return Err(LogwireError::BadMagic(magic));
    }
    if compression != COMPRESSION_NONE {
        return Err(LogwireError::BadCompression(compression));
    }
    let computed = crc32fast::hash(&payload);
    if computed != crc {
        return Err(LogwireError::CrcMismatch {
            expected: crc,
            computed,
        });
    }

    Ok(Some((payload, length)))
}
