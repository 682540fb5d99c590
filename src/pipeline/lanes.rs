//! Lane configuration.
//!
//! A lane is one target-size processing track with its own queue and size
//! bound. The lane table is built once at startup and shared read-only; the
//! dispatcher fans out across it and each worker is parametrized by one entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of derivative sizes carried on the wire.
///
/// Validated at deserialization time: an envelope with an unknown `Size`
/// fails to parse instead of reaching a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneSize {
    Small,
    Medium,
    Large,
}

impl LaneSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneSize::Small => "small",
            LaneSize::Medium => "medium",
            LaneSize::Large => "large",
        }
    }
}

impl fmt::Display for LaneSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resize lane: size label, queue name, pixel bound.
#[derive(Clone, Debug)]
pub struct LaneSpec {
    pub size: LaneSize,
    pub queue: String,
    pub max_dimension: u32,
}

impl LaneSpec {
    pub fn new(size: LaneSize, queue: impl Into<String>, max_dimension: u32) -> Self {
        Self {
            size,
            queue: queue.into(),
            max_dimension,
        }
    }

    /// The standard small/medium/large lane table.
    pub fn defaults() -> Vec<LaneSpec> {
        vec![
            LaneSpec::new(LaneSize::Small, "image-resize-small", 200),
            LaneSpec::new(LaneSize::Medium, "image-resize-medium", 500),
            LaneSpec::new(LaneSize::Large, "image-resize-large", 800),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lanes_cover_all_sizes() {
        let lanes = LaneSpec::defaults();
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0].size, LaneSize::Small);
        assert_eq!(lanes[0].max_dimension, 200);
        assert_eq!(lanes[1].size, LaneSize::Medium);
        assert_eq!(lanes[1].max_dimension, 500);
        assert_eq!(lanes[2].size, LaneSize::Large);
        assert_eq!(lanes[2].max_dimension, 800);
    }

    #[test]
    fn lane_size_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LaneSize::Medium).unwrap(),
            "\"medium\""
        );
        let parsed: LaneSize = serde_json::from_str("\"large\"").unwrap();
        assert_eq!(parsed, LaneSize::Large);
        assert!(serde_json::from_str::<LaneSize>("\"huge\"").is_err());
    }
}
