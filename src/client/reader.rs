//! Background reply reader: one task per connection.
//!
//! Accumulates socket bytes in one reusable buffer, splits complete
//! `length | code | body` frames off it, and routes each body to the job
//! at the head of the pending queue. Delivered payloads are zero-copy
//! slices of that buffer; its capacity is reclaimed once consumers drop
//! them.

use crate::client::pending::PendingResponse;
use crate::error::{LogwireError, Result};
use crate::protocol::wire;
use crate::types::ErrorCode;
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, trace};

pub(crate) async fn read_worker(
    mut half: OwnedReadHalf,
    mut pending_rx: mpsc::Receiver<PendingResponse>,
    shutdown: Arc<Notify>,
) {
    // The read loop only exits through an error path.
    let Err(err) = run(&mut half, &mut pending_rx, &shutdown).await else {
        return;
    };

    let failed = fail_all(&mut pending_rx, &err).await;
    if failed > 0 {
        error!("connection failed with {} pending requests: {}", failed, err);
    } else {
        debug!("read worker exiting: {}", err);
    }
}

async fn run(
    half: &mut OwnedReadHalf,
    pending_rx: &mut mpsc::Receiver<PendingResponse>,
    shutdown: &Notify,
) -> Result<()> {
    let mut read_buf = BytesMut::with_capacity(4096);
    loop {
        read_buf.reserve(4096);
        let n = tokio::select! {
            n = half.read_buf(&mut read_buf) => n?,
            _ = shutdown.notified() => {
                return Err(LogwireError::ConnectionLost(
                    "connection closed locally".into(),
                ));
            }
        };
        if n == 0 {
            if !read_buf.is_empty() {
                return Err(LogwireError::Protocol(format!(
                    "connection closed mid-reply with {} buffered bytes",
                    read_buf.len()
                )));
            }
            return Err(LogwireError::ConnectionLost("connection closed".into()));
        }
        while let Some(frame) = split_frame(&mut read_buf)? {
            handle_reply(frame, pending_rx).await?;
        }
    }
}

/// Split one complete reply frame off the buffer, or `None` until enough
/// bytes have arrived.
fn split_frame(src: &mut BytesMut) -> Result<Option<BytesMut>> {
    if src.len() < 4 {
        return Ok(None);
    }
    let len = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    if len < 2 {
        return Err(LogwireError::Protocol(format!(
            "invalid reply length {}",
            len
        )));
    }
    let len = len as usize;
    if src.len() < 4 + len {
        src.reserve(4 + len - src.len());
        return Ok(None);
    }
    src.advance(4);
    Ok(Some(src.split_to(len)))
}

async fn handle_reply(
    mut body: BytesMut,
    pending_rx: &mut mpsc::Receiver<PendingResponse>,
) -> Result<()> {
    trace!("reply frame of {} bytes", body.len());
    let code = ErrorCode::from_i16(wire::read_i16(&mut body)?);

    // The job was queued before its request bytes hit the wire, so it
    // must already be here.
    let job = pending_rx
        .try_recv()
        .unwrap_or_else(|_| panic!("received a reply with no outstanding request"));

    if code != ErrorCode::None {
        // Top-level broker error: the reply framing is intact, so only
        // the head-of-queue job fails and reading continues.
        job.fail(LogwireError::Broker(code)).await;
        return Ok(());
    }

    job.deliver(body).await
}

/// Teardown fan-out: every still-pending job gets one failure record and
/// a closed stream. Returns how many were failed.
async fn fail_all(pending_rx: &mut mpsc::Receiver<PendingResponse>, cause: &LogwireError) -> usize {
    pending_rx.close();
    let mut failed = 0;
    while let Ok(job) = pending_rx.try_recv() {
        job.fail(LogwireError::ConnectionLost(cause.to_string())).await;
        failed += 1;
    }
    failed
}
