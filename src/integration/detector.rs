//! Trait for the inference collaborator that feeds the pipeline.

use crate::tracker::Detection;

/// Source of per-frame detection lists.
///
/// Implement this trait to connect a detection model to the pipeline. Every
/// call must return the complete, already non-max-suppressed list for one
/// frame, in frame order.
///
/// # Example
///
/// ```
/// use intercept_rs::integration::DetectionSource;
/// use intercept_rs::tracker::Detection;
///
/// struct Replay {
///     frames: std::vec::IntoIter<Vec<Detection>>,
/// }
///
/// impl DetectionSource for Replay {
///     type Error = std::convert::Infallible;
///
///     fn next_detections(&mut self) -> Result<Option<Vec<Detection>>, Self::Error> {
///         Ok(self.frames.next())
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error;

    /// Detections for the next frame, or `None` once the source is exhausted.
    fn next_detections(&mut self) -> Result<Option<Vec<Detection>>, Self::Error>;
}
