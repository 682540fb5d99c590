//! Redis Streams queue adapter.
//!
//! Each named queue is one stream with one consumer group. Messages are read
//! with XREADGROUP and acknowledged only after their handler succeeded or
//! failed permanently; unacknowledged messages stay in the group's pending
//! list and are reclaimed (redelivered) once idle long enough. A message
//! whose delivery count exceeds the ceiling is copied to the
//! `{queue}:dead-letter` stream and acknowledged.

use crate::error::Result;
use crate::queue::{Disposition, MessageHandler, MessageQueue};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamPendingCountReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Field under which the JSON payload is stored in each stream entry.
const PAYLOAD_FIELD: &str = "payload";

/// Consumer tuning for all queues this process reads.
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Consumer group name (one group per queue)
    pub group: String,
    /// Consumer name (instance ID within the group)
    pub consumer_name: String,
    /// Batch size for reading messages
    pub batch_size: usize,
    /// How long one XREADGROUP blocks waiting for messages (ms)
    pub block_ms: u64,
    /// Delivery ceiling before a message is dead-lettered
    pub max_deliveries: u64,
    /// Minimum idle time before a pending message is reclaimed (ms)
    pub reclaim_idle_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "image-pipeline".to_string(),
            consumer_name: format!("instance-{}", uuid::Uuid::new_v4()),
            batch_size: 16,
            block_ms: 5_000,
            max_deliveries: 5,
            reclaim_idle_ms: 30_000,
        }
    }
}

/// Dead-letter stream for a queue.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}:dead-letter")
}

/// Queue transport backed by Redis Streams consumer groups.
pub struct RedisQueue {
    client: redis::Client,
    config: ConsumerConfig,
}

impl RedisQueue {
    pub fn new(url: &str, config: ConsumerConfig) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, config })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Create the consumer group for `queue` (idempotent).
    async fn ensure_group(&self, conn: &mut MultiplexedConnection, queue: &str) {
        // BUSYGROUP on re-creation is expected, so the error is ignored
        let _: std::result::Result<(), _> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(queue)
            .arg(&self.config.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(conn)
            .await;
    }

    /// Consume `queue` until shutdown, handing each message to `handler`.
    ///
    /// Acknowledgement follows the handler's error disposition; stalled
    /// pending messages are reclaimed between read batches.
    pub async fn run_consumer(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        self.ensure_group(&mut conn, queue).await;

        info!(
            queue = %queue,
            group = %self.config.group,
            consumer = %self.config.consumer_name,
            "Consumer started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue = %queue, "Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                read = self.read_batch(&mut conn, queue) => {
                    match read {
                        Ok(entries) => {
                            for (id, payload) in entries {
                                self.process_entry(&mut conn, queue, &id, &payload, handler.as_ref())
                                    .await;
                            }
                            if let Err(e) = self.reclaim_stalled(&mut conn, queue, handler.as_ref()).await {
                                warn!(queue = %queue, error = %e, "Reclaim pass failed");
                            }
                        }
                        Err(e) => {
                            error!(queue = %queue, error = %e, "Queue read failed");
                            sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        info!(queue = %queue, "Consumer stopped");
        Ok(())
    }

    /// Read the next batch of fresh messages for this consumer.
    async fn read_batch(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
    ) -> Result<Vec<(String, String)>> {
        let opts = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer_name)
            .count(self.config.batch_size)
            .block(self.config.block_ms as usize);

        // BLOCK timeouts surface as a nil reply
        let reply: Option<StreamReadReply> = conn.xread_options(&[queue], &[">"], &opts).await?;
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                match entry.get::<String>(PAYLOAD_FIELD) {
                    Some(payload) => entries.push((entry.id, payload)),
                    None => {
                        // Entry without a payload field cannot be processed
                        debug!(queue = %queue, id = %entry.id, "Entry missing payload, acking");
                        let _: i64 = conn.xack(queue, &self.config.group, &[&entry.id]).await?;
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Run one message through its handler and settle it per the disposition.
    async fn process_entry(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
        id: &str,
        payload: &str,
        handler: &dyn MessageHandler,
    ) {
        match handler.handle(payload).await {
            Ok(()) => {
                if let Err(e) = self.ack(conn, queue, id).await {
                    warn!(queue = %queue, id = %id, error = %e, "Ack failed");
                }
            }
            Err(err) => match Disposition::for_error(&err) {
                Disposition::Ack => {
                    warn!(queue = %queue, id = %id, error = %err, "Permanent failure, discarding message");
                    if let Err(e) = self.ack(conn, queue, id).await {
                        warn!(queue = %queue, id = %id, error = %e, "Ack failed");
                    }
                }
                Disposition::DeadLetter => {
                    warn!(queue = %queue, id = %id, error = %err, "Dead-lettering message");
                    if let Err(e) = self
                        .dead_letter(conn, queue, id, payload, &err.to_string())
                        .await
                    {
                        warn!(queue = %queue, id = %id, error = %e, "Dead-letter write failed");
                    }
                }
                Disposition::Retry => {
                    error!(
                        queue = %queue,
                        id = %id,
                        error = %err,
                        "Transient failure, message left pending for redelivery"
                    );
                }
            },
        }
    }

    /// Redeliver pending messages that have been idle long enough.
    ///
    /// Messages at or past the delivery ceiling are dead-lettered instead of
    /// being handed out again.
    async fn reclaim_stalled(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
        handler: &dyn MessageHandler,
    ) -> Result<()> {
        let pending: StreamPendingCountReply = conn
            .xpending_count(
                queue,
                &self.config.group,
                "-",
                "+",
                self.config.batch_size,
            )
            .await?;

        for stalled in pending.ids {
            if (stalled.last_delivered_ms as u64) < self.config.reclaim_idle_ms {
                continue;
            }

            let claimed: StreamClaimReply = conn
                .xclaim(
                    queue,
                    &self.config.group,
                    &self.config.consumer_name,
                    self.config.reclaim_idle_ms as usize,
                    &[&stalled.id],
                )
                .await?;

            // Another consumer may have claimed it first
            let Some(entry) = claimed.ids.into_iter().next() else {
                continue;
            };
            let Some(payload) = entry.get::<String>(PAYLOAD_FIELD) else {
                let _: i64 = conn.xack(queue, &self.config.group, &[&entry.id]).await?;
                continue;
            };

            if stalled.times_delivered as u64 >= self.config.max_deliveries {
                warn!(
                    queue = %queue,
                    id = %entry.id,
                    deliveries = stalled.times_delivered,
                    "Delivery ceiling reached, dead-lettering message"
                );
                self.dead_letter(conn, queue, &entry.id, &payload, "max deliveries exceeded")
                    .await?;
            } else {
                debug!(
                    queue = %queue,
                    id = %entry.id,
                    deliveries = stalled.times_delivered,
                    "Redelivering stalled message"
                );
                self.process_entry(conn, queue, &entry.id, &payload, handler)
                    .await;
            }
        }

        Ok(())
    }

    async fn ack(&self, conn: &mut MultiplexedConnection, queue: &str, id: &str) -> Result<()> {
        let _: i64 = conn.xack(queue, &self.config.group, &[id]).await?;
        Ok(())
    }

    /// Copy a message to the dead-letter stream, then acknowledge it.
    async fn dead_letter(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
        id: &str,
        payload: &str,
        reason: &str,
    ) -> Result<()> {
        let _: String = conn
            .xadd(
                dead_letter_queue(queue),
                "*",
                &[
                    (PAYLOAD_FIELD, payload),
                    ("source_id", id),
                    ("reason", reason),
                ],
            )
            .await?;
        self.ack(conn, queue, id).await
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn publish(&self, queue: &str, payload: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let id: String = conn.xadd(queue, "*", &[(PAYLOAD_FIELD, payload)]).await?;
        debug!(queue = %queue, id = %id, "Message published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_queue_naming() {
        assert_eq!(
            dead_letter_queue("image-resize-small"),
            "image-resize-small:dead-letter"
        );
    }

    #[test]
    fn default_consumer_names_are_unique() {
        let a = ConsumerConfig::default();
        let b = ConsumerConfig::default();
        assert_ne!(a.consumer_name, b.consumer_name);
        assert_eq!(a.group, "image-pipeline");
    }
}
