//! Glue between the inference collaborator and the tracking core.
//!
//! [`DetectionSource`] is the seam a detector backend implements;
//! [`Pipeline`] drives the frame cycle over it.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::DetectionSource;
pub use pipeline::{FrameReport, Pipeline, PipelineStats, StopHandle, TrackSnapshot};
