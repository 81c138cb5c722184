//! The connection engine: pipelined writer, background reader, and FIFO
//! routing of replies to per-request result streams.

mod connection;
mod pending;
mod reader;

pub use connection::{Connection, FetchStream, OffsetsStream};

pub(crate) use pending::PendingResponse;
