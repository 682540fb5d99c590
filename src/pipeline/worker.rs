//! Generic resize worker - executes one lane of the pipeline.
//!
//! One worker instance is parametrized by a `LaneSpec` and consumes that
//! lane's queue: download the original, resize to the lane's bound, upload
//! the derivative to its deterministic path. Re-processing the same envelope
//! overwrites the same path with the same content, so redelivery is safe.

use crate::error::{PipelineError, Result};
use crate::pipeline::lanes::LaneSpec;
use crate::pipeline::messages::{derivative_path, OrchestrationEnvelope};
use crate::pipeline::processor::ResizeProcessor;
use crate::queue::MessageHandler;
use crate::storage::BlobStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ResizeWorker {
    store: Arc<dyn BlobStore>,
    lane: LaneSpec,
    processor: Arc<ResizeProcessor>,
}

impl ResizeWorker {
    pub fn new(store: Arc<dyn BlobStore>, lane: LaneSpec, jpeg_quality: u8) -> Self {
        let processor = Arc::new(ResizeProcessor::new(lane.max_dimension, jpeg_quality));
        Self {
            store,
            lane,
            processor,
        }
    }

    pub fn lane(&self) -> &LaneSpec {
        &self.lane
    }

    /// Process one envelope to completion.
    pub async fn process(&self, envelope: &OrchestrationEnvelope) -> Result<()> {
        let file_name = &envelope.original_message.file_name;
        if file_name.is_empty() {
            return Err(PipelineError::Validation(
                "envelope has empty FileName".to_string(),
            ));
        }

        if envelope.processing.size != self.lane.size {
            // Processed with this worker's lane spec regardless
            warn!(
                envelope_size = %envelope.processing.size,
                lane = %self.lane.size,
                "Envelope size does not match this lane"
            );
        }

        if !self.store.exists(file_name).await? {
            return Err(PipelineError::NotFound(file_name.clone()));
        }

        let original = self.store.download(file_name).await?;
        let resized = self.processor.clone().generate_async(original).await?;

        let dest = derivative_path(file_name, self.lane.size.as_str());
        self.store
            .upload(&dest, resized.data.clone(), "image/jpeg")
            .await?;

        info!(
            lane = %self.lane.size,
            source = %file_name,
            dest = %dest,
            width = resized.width,
            height = resized.height,
            size = resized.data.len(),
            "Derivative stored"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ResizeWorker {
    async fn handle(&self, payload: &str) -> Result<()> {
        let envelope: OrchestrationEnvelope = serde_json::from_str(payload)?;

        match self.process(&envelope).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    lane = %self.lane.size,
                    file_name = %envelope.original_message.file_name,
                    error = %e,
                    "Lane processing failed"
                );
                Err(e)
            }
        }
    }
}
