//! Wire schemas for the pipeline queues.
//!
//! Field names are PascalCase on the wire for compatibility with the ingress
//! publisher. An `UploadEvent` is created once by ingress and travels through
//! the pipeline unchanged; the dispatcher wraps it in one
//! `OrchestrationEnvelope` per lane.

use crate::pipeline::lanes::{LaneSize, LaneSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message published by ingress when an original image lands in storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadEvent {
    pub user_id: String,
    pub image_url: String,
    /// Container-relative path of the original blob; must be non-empty.
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Lane-specific processing instructions carried inside an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaneDescriptor {
    pub size: LaneSize,
    pub width: u32,
}

impl From<&LaneSpec> for LaneDescriptor {
    fn from(lane: &LaneSpec) -> Self {
        Self {
            size: lane.size,
            width: lane.max_dimension,
        }
    }
}

/// Message published on each lane queue: the original event plus
/// processing instructions for that lane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestrationEnvelope {
    pub original_message: UploadEvent,
    pub processing: LaneDescriptor,
    pub orchestrated_at: DateTime<Utc>,
}

impl OrchestrationEnvelope {
    pub fn new(original: UploadEvent, lane: &LaneSpec) -> Self {
        Self {
            original_message: original,
            processing: LaneDescriptor::from(lane),
            orchestrated_at: Utc::now(),
        }
    }
}

/// Deterministic derivative location: `dirname/{label}/basename`.
///
/// The same (file name, label) pair always maps to the same path, which is
/// what makes redelivered messages safe to re-process: the upload simply
/// overwrites the previous derivative.
pub fn derivative_path(file_name: &str, label: &str) -> String {
    match file_name.rsplit_once('/') {
        Some((dir, base)) => format!("{dir}/{label}/{base}"),
        None => format!("{label}/{file_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> UploadEvent {
        UploadEvent {
            user_id: "u1".to_string(),
            image_url: "https://cdn.example.com/u1/abc.jpg".to_string(),
            file_name: "u1/abc.jpg".to_string(),
            uploaded_at: "2024-05-01T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn derivative_path_is_deterministic() {
        let a = derivative_path("u1/abc.jpg", "small");
        let b = derivative_path("u1/abc.jpg", "small");
        assert_eq!(a, b);
        assert_eq!(a, "u1/small/abc.jpg");
    }

    #[test]
    fn derivative_path_nested_and_flat() {
        assert_eq!(
            derivative_path("u1/2024/photo.png", "large"),
            "u1/2024/large/photo.png"
        );
        assert_eq!(derivative_path("abc.jpg", "medium"), "medium/abc.jpg");
    }

    #[test]
    fn upload_event_wire_format() {
        let value = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(
            value,
            json!({
                "UserId": "u1",
                "ImageUrl": "https://cdn.example.com/u1/abc.jpg",
                "FileName": "u1/abc.jpg",
                "UploadedAt": "2024-05-01T10:00:00Z",
            })
        );
    }

    #[test]
    fn envelope_wire_format() {
        let lane = LaneSpec::new(LaneSize::Small, "image-resize-small", 200);
        let envelope = OrchestrationEnvelope::new(sample_event(), &lane);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["Processing"], json!({ "Size": "small", "Width": 200 }));
        assert_eq!(value["OriginalMessage"]["FileName"], "u1/abc.jpg");
        assert!(value["OrchestratedAt"].is_string());
    }

    #[test]
    fn envelope_round_trips() {
        let lane = LaneSpec::new(LaneSize::Large, "image-resize-large", 800);
        let envelope = OrchestrationEnvelope::new(sample_event(), &lane);
        let body = serde_json::to_string(&envelope).unwrap();
        let parsed: OrchestrationEnvelope = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn envelope_with_unknown_size_is_rejected() {
        let body = json!({
            "OriginalMessage": serde_json::to_value(sample_event()).unwrap(),
            "Processing": { "Size": "gigantic", "Width": 4000 },
            "OrchestratedAt": "2024-05-01T10:00:01Z",
        })
        .to_string();
        assert!(serde_json::from_str::<OrchestrationEnvelope>(&body).is_err());
    }
}
