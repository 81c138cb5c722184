//! Continuous consumer over one connection: keeps a byte-offset cursor
//! per (topic, partition) and feeds one unified channel from periodic
//! batched fetches.

use crate::client::Connection;
use crate::error::{LogwireError, Result};
use crate::protocol::{FetchRequest, FetchResponse, MultiFetchRequest, OffsetsRequest};
use crate::types::{Offset, OffsetTime, TopicPartition, TopicPartitionOffset};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Tuning for the poll loop.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delay between fetch rounds; rate-limits polling when the log has
    /// nothing new.
    pub poll_interval: Duration,
    /// Maximum bytes fetched per partition in one cycle.
    pub fetch_max_size: i32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            fetch_max_size: 1024 * 1024,
        }
    }
}

/// A unified stream of records from many (topic, partition)s.
///
/// Lives until the first forwarded error or until dropped. Cursors advance
/// to each record's post-message offset as it is delivered, so the next
/// poll cycle picks up where the last one ended.
pub struct Stream {
    rx: mpsc::Receiver<Result<FetchResponse>>,
}

impl Stream {
    /// Start consuming from explicitly seeded offsets. A later target for
    /// the same (topic, partition) overrides an earlier one.
    pub fn new(conn: Connection, targets: Vec<TopicPartitionOffset>) -> Self {
        Self::with_config(conn, targets, StreamConfig::default())
    }

    pub fn with_config(
        conn: Connection,
        targets: Vec<TopicPartitionOffset>,
        config: StreamConfig,
    ) -> Self {
        let mut offsets: HashMap<TopicPartition, Offset> = HashMap::new();
        for target in targets {
            let offset = target.offset;
            offsets.insert(target.topic_partition(), offset);
        }
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(poll_loop(conn, offsets, tx, config));
        Self { rx }
    }

    /// Seed cursors from the broker: one pipelined offsets request per
    /// target at `time` (commonly [`OffsetTime::Latest`] or
    /// [`OffsetTime::Earliest`]), replies read in submission order.
    pub async fn from_time(
        conn: Connection,
        targets: Vec<TopicPartition>,
        time: OffsetTime,
    ) -> Result<Self> {
        Self::from_time_with_config(conn, targets, time, StreamConfig::default()).await
    }

    pub async fn from_time_with_config(
        conn: Connection,
        targets: Vec<TopicPartition>,
        time: OffsetTime,
        config: StreamConfig,
    ) -> Result<Self> {
        let mut replies = Vec::with_capacity(targets.len());
        for target in &targets {
            let req = OffsetsRequest::new(target.topic.clone(), target.partition, time, 1);
            replies.push(conn.offsets(&req).await?);
        }

        let mut seeded = Vec::with_capacity(targets.len());
        for (target, mut reply) in targets.into_iter().zip(replies) {
            let response = reply
                .recv()
                .await
                .ok_or_else(|| LogwireError::ConnectionLost("offsets stream closed".into()))??;
            let first = response.offsets.into_iter().next().ok_or_else(|| {
                LogwireError::Protocol(format!(
                    "broker returned no offsets for {}/{}",
                    target.topic, target.partition
                ))
            })?;
            seeded.push(first);
        }

        Ok(Self::with_config(conn, seeded, config))
    }

    /// Next record, or `None` once the stream has terminated.
    pub async fn recv(&mut self) -> Option<Result<FetchResponse>> {
        self.rx.recv().await
    }
}

async fn poll_loop(
    conn: Connection,
    mut offsets: HashMap<TopicPartition, Offset>,
    tx: mpsc::Sender<Result<FetchResponse>>,
    config: StreamConfig,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            return;
        }

        let requests: Vec<FetchRequest> = offsets
            .iter()
            .map(|(tp, &offset)| {
                FetchRequest::new(tp.topic.clone(), tp.partition, offset, config.fetch_max_size)
            })
            .collect();
        trace!("polling {} targets", requests.len());

        let mut replies = match conn.multi_fetch(&MultiFetchRequest(requests)).await {
            Ok(replies) => replies,
            Err(err) => {
                let _ = tx.send(Err(err)).await;
                return;
            }
        };

        while let Some(item) = replies.recv().await {
            match item {
                Ok(response) => {
                    let tp = TopicPartition::new(response.topic.clone(), response.partition);
                    let offset = response.offset;
                    if tx.send(Ok(response)).await.is_err() {
                        return;
                    }
                    offsets.insert(tp, offset);
                }
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            }
        }
    }
}
