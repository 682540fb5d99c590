//! Message queue abstraction.
//!
//! All coordination between pipeline stages goes through named queues with
//! at-least-once delivery: a handler that fails with a retryable error leaves
//! its message unacknowledged, and the transport redelivers it until a
//! bounded delivery count is exhausted and the message is dead-lettered.

pub mod redis;

use crate::error::{PipelineError, Result};
use async_trait::async_trait;

pub use self::redis::{ConsumerConfig, RedisQueue};

/// Publishing side of the queue, the only side the dispatcher needs.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append a payload to the named queue.
    async fn publish(&self, queue: &str, payload: &str) -> Result<()>;
}

/// One pipeline stage's message entry point.
///
/// Implementations parse the raw payload themselves so that parse failures
/// surface as `Serialization` errors and get dead-lettered instead of
/// crashing the consumer loop.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &str) -> Result<()>;
}

/// What the consumer loop does with a message after its handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge and move on (success, or a permanent failure that
    /// redelivery cannot repair)
    Ack,
    /// Copy to the dead-letter stream, then acknowledge
    DeadLetter,
    /// Leave unacknowledged so the queue redelivers it
    Retry,
}

impl Disposition {
    /// Classify a handler failure.
    ///
    /// Validation, missing originals and undecodable images are permanent:
    /// redelivery cannot repair them, so the message is discarded. Unparsable
    /// payloads are permanent too but are preserved on the dead-letter stream
    /// for inspection. Only transient I/O failures trigger redelivery.
    pub fn for_error(err: &PipelineError) -> Disposition {
        match err {
            PipelineError::Validation(_)
            | PipelineError::NotFound(_)
            | PipelineError::Decode(_) => Disposition::Ack,
            PipelineError::Serialization(_) => Disposition::DeadLetter,
            PipelineError::Transient(_) => Disposition::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialization_error() -> PipelineError {
        serde_json::from_str::<crate::pipeline::messages::UploadEvent>("{")
            .map_err(PipelineError::from)
            .unwrap_err()
    }

    #[test]
    fn permanent_errors_are_discarded() {
        let errs = [
            PipelineError::Validation("empty file name".into()),
            PipelineError::NotFound("u1/abc.jpg".into()),
            PipelineError::Decode("bad jpeg".into()),
        ];
        for err in errs {
            assert_eq!(Disposition::for_error(&err), Disposition::Ack);
        }
    }

    #[test]
    fn malformed_payloads_are_dead_lettered() {
        assert_eq!(
            Disposition::for_error(&serialization_error()),
            Disposition::DeadLetter
        );
    }

    #[test]
    fn transient_errors_are_retried() {
        let err = PipelineError::Transient("connection reset".into());
        assert_eq!(Disposition::for_error(&err), Disposition::Retry);
        assert!(err.is_retryable());
    }
}
