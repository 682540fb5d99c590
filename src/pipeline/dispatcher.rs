//! Dispatcher - fans one upload event into one envelope per resize lane.
//!
//! All lane publishes are issued concurrently and the dispatch succeeds only
//! if every publish succeeded. On partial failure the ingress message stays
//! unacknowledged and is redelivered in full, which may re-publish envelopes
//! to lanes that already got one - safe because lane processing is
//! idempotent.

use crate::error::{PipelineError, Result};
use crate::pipeline::lanes::LaneSpec;
use crate::pipeline::messages::{OrchestrationEnvelope, UploadEvent};
use crate::queue::{MessageHandler, MessageQueue};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Dispatcher {
    queue: Arc<dyn MessageQueue>,
    lanes: Vec<LaneSpec>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn MessageQueue>, lanes: Vec<LaneSpec>) -> Self {
        Self { queue, lanes }
    }

    /// Fan the event out across all configured lanes (join-all semantics).
    pub async fn dispatch(&self, event: &UploadEvent) -> Result<()> {
        if event.file_name.is_empty() {
            return Err(PipelineError::Validation(
                "upload event has empty FileName".to_string(),
            ));
        }

        let publishes = self
            .lanes
            .iter()
            .map(|lane| self.publish_to_lane(event, lane));
        futures::future::try_join_all(publishes).await?;

        info!(
            file_name = %event.file_name,
            lanes = self.lanes.len(),
            "Upload event fanned out"
        );
        Ok(())
    }

    async fn publish_to_lane(&self, event: &UploadEvent, lane: &LaneSpec) -> Result<()> {
        let envelope = OrchestrationEnvelope::new(event.clone(), lane);
        let body = serde_json::to_string(&envelope)?;
        self.queue.publish(&lane.queue, &body).await?;

        debug!(queue = %lane.queue, size = %lane.size, "Envelope published");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, payload: &str) -> Result<()> {
        let event: UploadEvent = serde_json::from_str(payload)?;
        self.dispatch(&event).await
    }
}
