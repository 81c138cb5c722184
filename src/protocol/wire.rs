//! Checked reads of big-endian wire primitives.
//!
//! Writes go straight through `BufMut` (`put_i16`, `put_i32`, ...) at the
//! call sites; reads come through here so a short buffer surfaces as a
//! protocol error instead of a panic.

use crate::error::{LogwireError, Result};
use bytes::{Buf, BufMut, BytesMut};

pub(crate) fn read_i8(buf: &mut impl Buf) -> Result<i8> {
    if buf.remaining() < 1 {
        return Err(short("i8"));
    }
    Ok(buf.get_i8())
}

pub(crate) fn read_i16(buf: &mut impl Buf) -> Result<i16> {
    if buf.remaining() < 2 {
        return Err(short("i16"));
    }
    Ok(buf.get_i16())
}

pub(crate) fn read_i32(buf: &mut impl Buf) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(short("i32"));
    }
    Ok(buf.get_i32())
}

pub(crate) fn read_i64(buf: &mut impl Buf) -> Result<i64> {
    if buf.remaining() < 8 {
        return Err(short("i64"));
    }
    Ok(buf.get_i64())
}

pub(crate) fn read_u32(buf: &mut impl Buf) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(short("u32"));
    }
    Ok(buf.get_u32())
}

fn short(what: &str) -> LogwireError {
    LogwireError::Protocol(format!("not enough bytes for {}", what))
}

/// Write a topic string with its 16-bit length prefix.
pub(crate) fn write_topic(dst: &mut BytesMut, topic: &str) {
    dst.put_i16(topic.len() as i16);
    dst.extend_from_slice(topic.as_bytes());
}

/// On-wire size of a length-prefixed topic string.
pub(crate) fn topic_len(topic: &str) -> i32 {
    2 + topic.len() as i32
}
