//! Response jobs: the client-side record of an outstanding request.
//!
//! The protocol has no request ids, so a reply is matched to the
//! head-of-queue job purely by arrival order. Each job carries the
//! delivery channel and whatever request context the reply omits: the
//! offsets target, or a multi-fetch's ordered subrequest list.

use crate::error::{LogwireError, Result};
use crate::protocol::{decode_next, decode_offsets_body, FetchResponse, OffsetsResponse};
use crate::protocol::wire;
use crate::types::{ErrorCode, TopicPartition, TopicPartitionOffset};
use bytes::BytesMut;
use tokio::sync::mpsc;

pub(crate) enum PendingResponse {
    Offsets {
        target: TopicPartition,
        tx: mpsc::Sender<Result<OffsetsResponse>>,
    },
    Fetch {
        target: TopicPartitionOffset,
        tx: mpsc::Sender<Result<FetchResponse>>,
    },
    MultiFetch {
        targets: Vec<TopicPartitionOffset>,
        tx: mpsc::Sender<Result<FetchResponse>>,
    },
}

impl PendingResponse {
    /// Deliver one error record, then close the stream (sender drop).
    pub(crate) async fn fail(self, err: LogwireError) {
        match self {
            PendingResponse::Offsets { tx, .. } => {
                let _ = tx.send(Err(err)).await;
            }
            PendingResponse::Fetch { tx, .. } | PendingResponse::MultiFetch { tx, .. } => {
                let _ = tx.send(Err(err)).await;
            }
        }
    }

    /// Decode a reply body and deliver its records. A returned error is
    /// terminal for the connection: it has already been delivered to this
    /// job's stream, but the remaining socket bytes can no longer be
    /// trusted to be aligned.
    pub(crate) async fn deliver(self, mut body: BytesMut) -> Result<()> {
        match self {
            PendingResponse::Offsets { target, tx } => {
                match decode_offsets_body(&mut body, &target) {
                    Ok(response) => {
                        let _ = tx.send(Ok(response)).await;
                    }
                    Err(err) => return fail_and_bubble(tx, err).await,
                }
            }
            PendingResponse::Fetch { target, tx } => {
                if let Err(err) = deliver_message_set(&tx, &target, &mut body).await {
                    return fail_and_bubble(tx, err).await;
                }
            }
            PendingResponse::MultiFetch { targets, tx } => {
                for target in &targets {
                    // Fewer message sets than subrequests is a clean end.
                    if body.is_empty() {
                        break;
                    }
                    let set_len = match wire::read_i32(&mut body) {
                        Ok(len) => len,
                        Err(err) => return fail_and_bubble(tx, err).await,
                    };
                    if set_len < 2 || body.len() < set_len as usize {
                        let err = LogwireError::Protocol(format!(
                            "multi-fetch message set truncated: need {} bytes, have {}",
                            set_len,
                            body.len()
                        ));
                        return fail_and_bubble(tx, err).await;
                    }
                    let mut set = body.split_to(set_len as usize);
                    let code = match wire::read_i16(&mut set) {
                        Ok(code) => ErrorCode::from_i16(code),
                        Err(err) => return fail_and_bubble(tx, err).await,
                    };
                    if code != ErrorCode::None {
                        // Only this subrequest failed; the reply framing is
                        // intact, so deliver it labeled and keep going.
                        let _ = tx
                            .send(Err(LogwireError::PartitionBroker {
                                topic: target.topic.clone(),
                                partition: target.partition,
                                code,
                            }))
                            .await;
                        continue;
                    }
                    if let Err(err) = deliver_message_set(&tx, target, &mut set).await {
                        return fail_and_bubble(tx, err).await;
                    }
                }
            }
        }

        // The reply declared its own length; a decoder that leaves bytes
        // behind has lost the framing guarantee. No safe continuation.
        assert!(
            body.is_empty(),
            "reply not fully consumed: {} bytes remain",
            body.len()
        );
        Ok(())
    }
}

/// Walk a message set, delivering each record with its post-message
/// offset (`prior + length field + 4`). Ends cleanly only on an empty
/// buffer; a partial record is an error.
async fn deliver_message_set(
    tx: &mpsc::Sender<Result<FetchResponse>>,
    target: &TopicPartitionOffset,
    buf: &mut BytesMut,
) -> Result<()> {
    let mut offset = target.offset;
    while let Some((payload, length)) = decode_next(buf)? {
        offset += (length + 4) as i64;
        let response = FetchResponse {
            topic: target.topic.clone(),
            partition: target.partition,
            offset,
            payload,
        };
        // A dropped receiver must not stop the walk: the rest of the set
        // still has to be consumed and validated.
        let _ = tx.send(Ok(response)).await;
    }
    Ok(())
}

/// Deliver `err` on the stream and hand the reader a terminal error
/// naming the same cause.
async fn fail_and_bubble<T>(
    tx: mpsc::Sender<Result<T>>,
    err: LogwireError,
) -> Result<()> {
    let terminal = LogwireError::ConnectionLost(err.to_string());
    let _ = tx.send(Err(err)).await;
    Err(terminal)
}
