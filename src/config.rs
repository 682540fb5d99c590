//! Configuration for the pipeline worker.
//!
//! Built once from the environment at process start and passed by reference
//! to each component; no component reads environment variables itself.
//! The queue URL and storage bucket are required with no defaults.

use crate::error::{PipelineError, Result};
use crate::pipeline::lanes::LaneSpec;
use crate::pipeline::processor::DEFAULT_JPEG_QUALITY;
use crate::queue::ConsumerConfig;

#[derive(Clone, Debug)]
pub struct Config {
    /// Redis connection URL for the queue transport
    pub queue_url: String,
    pub storage: StorageConfig,
    pub consumer: ConsumerConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Endpoint override for S3-compatible stores
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Queue the dispatcher consumes upload events from
    pub dispatch_queue: String,
    pub lanes: Vec<LaneSpec>,
    pub jpeg_quality: u8,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let queue_url = require_env("REDIS_URL")?;
        let bucket = require_env("S3_BUCKET")?;

        let mut consumer = ConsumerConfig::default();
        if let Some(group) = env_opt("PIPELINE_GROUP") {
            consumer.group = group;
        }
        consumer.batch_size = env_parse("PIPELINE_BATCH_SIZE", consumer.batch_size);
        consumer.block_ms = env_parse("PIPELINE_BLOCK_MS", consumer.block_ms);
        consumer.max_deliveries = env_parse("PIPELINE_MAX_DELIVERIES", consumer.max_deliveries);
        consumer.reclaim_idle_ms = env_parse("PIPELINE_RECLAIM_IDLE_MS", consumer.reclaim_idle_ms);

        Ok(Config {
            queue_url,
            storage: StorageConfig {
                bucket,
                region: env_opt("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: env_opt("S3_ENDPOINT"),
            },
            consumer,
            pipeline: PipelineConfig {
                dispatch_queue: env_opt("PIPELINE_DISPATCH_QUEUE")
                    .unwrap_or_else(|| "image-processing".to_string()),
                lanes: LaneSpec::defaults(),
                jpeg_quality: env_parse("JPEG_QUALITY", DEFAULT_JPEG_QUALITY),
            },
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| PipelineError::Validation(format!("{name} not set")))
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
