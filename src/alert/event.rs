//! Alert records handed to delivery sinks.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::tracker::{Detection, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Detection,
    Engagement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    /// [x1, y1, x2, y2]
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: Option<String>,
    pub distance_m: Option<f64>,
    pub velocity_mps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    /// None for a detection not attached to any track
    pub track_id: Option<u64>,
    pub kind: AlertKind,
    pub frame_number: u64,
    /// Pipeline clock reading, serialized as seconds
    #[serde(rename = "timestamp_s", serialize_with = "as_secs")]
    pub timestamp: Duration,
    pub payload: AlertPayload,
}

impl AlertEvent {
    pub fn detection(detection: &Detection, track_id: Option<u64>, now: Duration) -> Self {
        Self {
            track_id,
            kind: AlertKind::Detection,
            frame_number: detection.frame_number,
            timestamp: now,
            payload: AlertPayload {
                bbox: detection.bbox.to_tlbr(),
                confidence: detection.confidence,
                class_id: detection.class_id,
                class_name: detection.class_name.clone(),
                distance_m: None,
                velocity_mps: None,
            },
        }
    }

    pub fn engagement(track: &Track, frame_number: u64, now: Duration) -> Self {
        let targeting = track.targeting();
        Self {
            track_id: Some(track.id()),
            kind: AlertKind::Engagement,
            frame_number,
            timestamp: now,
            payload: AlertPayload {
                bbox: track.bbox().to_tlbr(),
                confidence: track.confidence(),
                class_id: track.class_id(),
                class_name: track.class_name().map(str::to_owned),
                distance_m: targeting.and_then(|t| t.distance_m()),
                velocity_mps: targeting.and_then(|t| t.velocity_mps()),
            },
        }
    }
}

fn as_secs<S: Serializer>(timestamp: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timestamp.as_secs_f64())
}
