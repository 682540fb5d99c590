//! The fan-out image-derivative pipeline.
//!
//! One upload event comes in on the dispatch queue; the dispatcher publishes
//! one envelope per configured lane; one generic worker per lane turns each
//! envelope into a stored derivative. There is no cross-lane coordination -
//! lanes complete independently and in any order.

pub mod dispatcher;
pub mod lanes;
pub mod messages;
pub mod processor;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use lanes::{LaneSize, LaneSpec};
pub use messages::{derivative_path, LaneDescriptor, OrchestrationEnvelope, UploadEvent};
pub use processor::{ResizeProcessor, ResizedImage, DEFAULT_JPEG_QUALITY};
pub use worker::ResizeWorker;
