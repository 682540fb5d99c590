//! Pipeline worker - runs the dispatcher and one resize consumer per lane.
//!
//! Consumes upload events from the dispatch queue, fans them out across the
//! lane queues and processes each lane queue with a generic resize worker.
//! All stages run in one process here; lanes can also be split across
//! processes since coordination happens only through the queues.
//!
//! Environment variables:
//! - REDIS_URL: queue transport connection URL (required)
//! - S3_BUCKET: bucket holding originals and derivatives (required)
//! - AWS_REGION, S3_ENDPOINT: storage overrides
//! - PIPELINE_DISPATCH_QUEUE: upload-event queue (default: "image-processing")
//! - PIPELINE_GROUP, PIPELINE_BATCH_SIZE, PIPELINE_BLOCK_MS,
//!   PIPELINE_MAX_DELIVERIES, PIPELINE_RECLAIM_IDLE_MS: consumer tuning
//! - JPEG_QUALITY: derivative encode quality (default: 85)

use image_pipeline::config::Config;
use image_pipeline::pipeline::{Dispatcher, ResizeWorker};
use image_pipeline::queue::{MessageQueue, RedisQueue};
use image_pipeline::storage::{BlobStore, S3BlobStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_pipeline=info".parse()?)
                .add_directive("pipeline_worker=info".parse()?),
        )
        .init();

    info!("Starting pipeline worker");

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    info!(
        bucket = %config.storage.bucket,
        dispatch_queue = %config.pipeline.dispatch_queue,
        lanes = config.pipeline.lanes.len(),
        "Configuration loaded"
    );

    let store: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(&config.storage).await);
    let queue = Arc::new(RedisQueue::new(&config.queue_url, config.consumer.clone())?);

    // Graceful shutdown on SIGINT
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut consumers = Vec::new();

    // Dispatcher: upload events in, one envelope per lane out
    let dispatcher = Arc::new(Dispatcher::new(
        queue.clone() as Arc<dyn MessageQueue>,
        config.pipeline.lanes.clone(),
    ));
    {
        let queue = queue.clone();
        let dispatch_queue = config.pipeline.dispatch_queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        consumers.push(tokio::spawn(async move {
            queue
                .run_consumer(&dispatch_queue, dispatcher, shutdown_rx)
                .await
        }));
    }

    // One generic resize consumer per lane
    for lane in &config.pipeline.lanes {
        let worker = Arc::new(ResizeWorker::new(
            store.clone(),
            lane.clone(),
            config.pipeline.jpeg_quality,
        ));
        let queue = queue.clone();
        let lane_queue = lane.queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        consumers.push(tokio::spawn(async move {
            queue.run_consumer(&lane_queue, worker, shutdown_rx).await
        }));
    }

    info!(consumers = consumers.len(), "All consumers started");

    for consumer in consumers {
        match consumer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Consumer exited with error"),
            Err(e) => error!(error = %e, "Consumer task panicked"),
        }
    }

    info!("Pipeline worker stopped");
    Ok(())
}
