//! Builder for creating Detection objects from various input formats.

use std::time::Duration;

use crate::tracker::{Detection, Rect};

/// Builder for creating `Detection` objects from detector outputs.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    bbox: Rect,
    confidence: f32,
    class_id: u32,
    class_name: Option<String>,
    frame_number: u64,
    timestamp: Duration,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::from_xywh(cx, cy, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, l: f32, t: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(l, t, w, h);
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the class id and, optionally, its label.
    pub fn class(mut self, class_id: u32, name: Option<&str>) -> Self {
        self.class_id = class_id;
        self.class_name = name.map(str::to_owned);
        self
    }

    pub fn frame(mut self, frame_number: u64) -> Self {
        self.frame_number = frame_number;
        self
    }

    /// Capture time of the frame.
    pub fn timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the final `Detection`. Validation happens at pipeline ingestion.
    pub fn build(self) -> Detection {
        Detection {
            bbox: self.bbox,
            confidence: self.confidence,
            class_id: self.class_id,
            class_name: self.class_name,
            frame_number: self.frame_number,
            timestamp: self.timestamp,
        }
    }
}
