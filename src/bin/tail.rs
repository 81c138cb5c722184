//! Tail topic partitions to stdout.
//!
//! Usage: logwire-tail <topic>[/<partition>] ...
//! Set LOGWIRE_ADDR to pick the broker endpoint (default 127.0.0.1:9092).

use logwire::{Connection, OffsetTime, Stream, TopicPartition};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("logwire=info".parse()?))
        .init();

    let targets = std::env::args()
        .skip(1)
        .map(|arg| match arg.split_once('/') {
            Some((topic, partition)) => Ok(TopicPartition::new(topic, partition.parse()?)),
            None => Ok(TopicPartition::new(arg, 0)),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    anyhow::ensure!(
        !targets.is_empty(),
        "usage: logwire-tail <topic>[/<partition>] ..."
    );

    let addr = std::env::var("LOGWIRE_ADDR").unwrap_or_else(|_| "127.0.0.1:9092".to_string());
    let conn = Connection::dial(addr.as_str()).await?;
    let mut stream = Stream::from_time(conn, targets, OffsetTime::Latest).await?;

    while let Some(item) = stream.recv().await {
        let record = item?;
        println!(
            "{}/{}@{}: {}",
            record.topic,
            record.partition,
            record.offset,
            String::from_utf8_lossy(&record.payload)
        );
    }
    Ok(())
}
