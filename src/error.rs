//! Error types for the image pipeline.
//!
//! Every failure is classified as permanent or recoverable up front so the
//! consumer loop can decide between discarding, dead-lettering and leaving a
//! message unacknowledged for redelivery.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while dispatching or processing an image message.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required message field is missing or malformed
    #[error("validation failed: {0}")]
    Validation(String),

    /// The original blob the message refers to does not exist
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The downloaded payload is not a decodable image
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The message payload could not be parsed
    #[error("malformed message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Recoverable I/O failure (storage, queue, timeout)
    #[error("transient failure: {0}")]
    Transient(String),
}

impl PipelineError {
    /// Whether redelivering the message could ever succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }
}

impl From<redis::RedisError> for PipelineError {
    fn from(err: redis::RedisError) -> Self {
        PipelineError::Transient(format!("redis: {err}"))
    }
}
