//! Image derivative pipeline
//!
//! Queue-driven worker service that turns each uploaded image into
//! small/medium/large derivatives. A dispatcher consumes upload events and
//! fans them out into one envelope per resize lane; a generic per-lane worker
//! downloads the original, resizes it within the lane's bound and stores the
//! derivative at a deterministic, overwrite-safe path.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod storage;

// Public re-exports
pub use config::Config;
pub use error::{PipelineError, Result};
