//! A single long-lived broker connection.
//!
//! Requests are pipelined: callers may submit while earlier replies are
//! still in flight, and the broker answers strictly in submission order.
//! The write path serializes under one lock so frames never interleave,
//! and enqueues the response job *before* the frame's bytes leave the
//! buffer, since the reader matches replies to jobs purely by FIFO
//! position.

use crate::client::pending::PendingResponse;
use crate::client::reader;
use crate::error::{LogwireError, Result};
use crate::protocol::{
    encode_frame, FetchRequest, FetchResponse, MultiFetchRequest, MultiProduceRequest,
    OffsetsRequest, OffsetsResponse, ProduceRequest, Request,
};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::debug;

/// Result stream for fetch and multi-fetch: zero or more records, at most
/// one error per subrequest, then channel close.
pub type FetchStream = mpsc::Receiver<Result<FetchResponse>>;

/// Result stream for offsets: exactly one item, then channel close.
pub type OffsetsStream = mpsc::Receiver<Result<OffsetsResponse>>;

/// Outstanding requests allowed before submission blocks on the broker.
const DEFAULT_QUEUE_SIZE: usize = 128;

struct Writer {
    half: OwnedWriteHalf,
    pending_tx: mpsc::Sender<PendingResponse>,
    buf: BytesMut,
}

/// Shared handle to one broker connection. Clones share the socket and
/// the pending-request queue.
#[derive(Clone)]
pub struct Connection {
    writer: Arc<Mutex<Writer>>,
    shutdown: Arc<Notify>,
}

impl Connection {
    /// Connect and start the background reply reader.
    pub async fn dial(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let (pending_tx, pending_rx) = mpsc::channel(DEFAULT_QUEUE_SIZE);
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(reader::read_worker(
            read_half,
            pending_rx,
            Arc::clone(&shutdown),
        ));
        debug!("dialed broker at {}", peer);

        Ok(Self {
            writer: Arc::new(Mutex::new(Writer {
                half: write_half,
                pending_tx,
                buf: BytesMut::with_capacity(4096),
            })),
            shutdown,
        })
    }

    /// Append messages to one (topic, partition). The protocol defines no
    /// produce reply; only write errors surface.
    pub async fn produce(&self, req: &ProduceRequest) -> Result<()> {
        self.submit(req, None).await
    }

    /// Append to several (topic, partition)s in one frame. Fire-and-forget
    /// like [`produce`](Self::produce).
    pub async fn multi_produce(&self, req: &MultiProduceRequest) -> Result<()> {
        self.submit(req, None).await
    }

    /// Read messages from one (topic, partition) starting at a byte
    /// offset. Records arrive on the returned stream in offset order.
    ///
    /// Payloads are zero-copy slices of the reply buffer; holding one pins
    /// that buffer, so copy the bytes out if you retain messages
    /// long-term.
    pub async fn fetch(&self, req: &FetchRequest) -> Result<FetchStream> {
        let (tx, rx) = mpsc::channel(1);
        let job = PendingResponse::Fetch {
            target: req.target(),
            tx,
        };
        self.submit(req, Some(job)).await?;
        Ok(rx)
    }

    /// Read from several (topic, partition)s in one round trip. Records
    /// are labeled from the request's subrequest order, since the reply
    /// omits topic/partition metadata. Same payload-retention contract as
    /// [`fetch`](Self::fetch).
    pub async fn multi_fetch(&self, req: &MultiFetchRequest) -> Result<FetchStream> {
        let (tx, rx) = mpsc::channel(1);
        let job = PendingResponse::MultiFetch {
            targets: req.targets(),
            tx,
        };
        self.submit(req, Some(job)).await?;
        Ok(rx)
    }

    /// Ask for offsets near a time. The stream yields exactly one
    /// response, labeled with the request's (topic, partition).
    pub async fn offsets(&self, req: &OffsetsRequest) -> Result<OffsetsStream> {
        let (tx, rx) = mpsc::channel(1);
        let job = PendingResponse::Offsets {
            target: req.target(),
            tx,
        };
        self.submit(req, Some(job)).await?;
        Ok(rx)
    }

    /// Shut the connection down. Every still-pending request is failed
    /// with a connection-lost error and its stream closed; later
    /// submissions are rejected.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.half.shutdown().await?;
        self.shutdown.notify_one();
        Ok(())
    }

    async fn submit(&self, req: &impl Request, job: Option<PendingResponse>) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = &mut *writer;

        // Enqueue before any byte is written: once the frame is on the
        // wire the broker may reply, and the reader panics on a reply
        // with nothing pending.
        if let Some(job) = job {
            writer
                .pending_tx
                .send(job)
                .await
                .map_err(|_| LogwireError::Closed)?;
        }

        let total_len = req.wire_len();
        writer.buf.clear();
        encode_frame(req, &mut writer.buf);
        assert_eq!(
            writer.buf.len(),
            total_len as usize + 4,
            "frame length accounting broke: declared {}, encoded {}",
            total_len + 4,
            writer.buf.len(),
        );

        writer.half.write_all(&writer.buf).await?;
        writer.half.flush().await?;
        Ok(())
    }
}
