//! Wire protocol: big-endian primitives, message records, request
//! encoders and response types.
//!
//! Frame layouts:
//! request:  `total_len (4 BE) | type (2 BE) | body`
//! reply:    `response_len (4 BE) | error_code (2 BE) | body`

mod message;
mod request;
mod response;
pub(crate) mod wire;

pub use message::Message;
pub use request::{
    encode_frame, FetchRequest, MultiFetchRequest, MultiProduceRequest, OffsetsRequest,
    ProduceRequest, Request, RequestKind,
};
pub use response::{FetchResponse, OffsetsResponse};

pub(crate) use message::decode_next;
pub(crate) use response::decode_offsets_body;
