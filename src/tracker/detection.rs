//! Per-frame detector output consumed by the tracker.

use std::time::Duration;

use crate::error::DetectionError;
use crate::tracker::rect::Rect;

/// Detection input for the tracker.
///
/// Produced once per frame by the inference collaborator, already filtered
/// by confidence and non-max suppression.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in pixel space
    pub bbox: Rect,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: Option<String>,
    /// Frame the detection was produced for
    pub frame_number: u64,
    /// Capture time of the frame
    pub timestamp: Duration,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), confidence)
    }

    pub fn from_rect(bbox: Rect, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            class_id: 0,
            class_name: None,
            frame_number: 0,
            timestamp: Duration::ZERO,
        }
    }

    /// Check the ingestion invariants: finite box, x1 < x2, y1 < y2,
    /// confidence within [0, 1].
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.bbox.is_finite() {
            return Err(DetectionError::NonFiniteBox);
        }
        if self.bbox.width <= 0.0 || self.bbox.height <= 0.0 {
            return Err(DetectionError::DegenerateBox {
                width: self.bbox.width,
                height: self.bbox.height,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionError::ConfidenceOutOfRange(self.confidence));
        }
        Ok(())
    }

    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }
}
