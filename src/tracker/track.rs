//! Single object track.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MotionKind;
use crate::error::TrackingError;
use crate::targeting::TargetingState;
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::motion::MotionModel;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// A persistent identity for one object across frames.
///
/// Counters are only mutated by the owning [`TrackStore`](crate::tracker::TrackStore)
/// during a frame cycle; everything outside reads them through accessors.
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    state: TrackState,
    /// Matched boxes, newest last
    history: VecDeque<Rect>,
    /// Confidence of each entry in `history`
    confidences: VecDeque<f32>,
    history_len: usize,
    motion: MotionModel,
    /// Total frames matched, including the spawning detection
    hits: u32,
    /// Consecutive frames matched
    hit_streak: u32,
    /// Frames since creation
    age: u32,
    /// Disappearance counter
    frames_since_seen: u32,
    last_seen_frame: u64,
    last_seen: Duration,
    confidence: f32,
    class_id: u32,
    class_name: Option<String>,
    targeting: Option<TargetingState>,
}

impl Track {
    pub(crate) fn spawn(
        id: u64,
        detection: &Detection,
        kind: MotionKind,
        filter: &Arc<KalmanFilter>,
        history_len: usize,
        min_hits: u32,
    ) -> Self {
        let mut history = VecDeque::with_capacity(history_len);
        history.push_back(detection.bbox);
        let mut confidences = VecDeque::with_capacity(history_len);
        confidences.push_back(detection.confidence);
        let state = if min_hits <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        Self {
            id,
            state,
            history,
            confidences,
            history_len,
            motion: MotionModel::new(kind, filter, detection.center()),
            hits: 1,
            hit_streak: 1,
            age: 0,
            frames_since_seen: 0,
            last_seen_frame: detection.frame_number,
            last_seen: detection.timestamp,
            confidence: detection.confidence,
            class_id: detection.class_id,
            class_name: detection.class_name.clone(),
            targeting: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn hit_streak(&self) -> u32 {
        self.hit_streak
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn frames_since_seen(&self) -> u32 {
        self.frames_since_seen
    }

    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    pub fn last_seen(&self) -> Duration {
        self.last_seen
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn motion(&self) -> &MotionModel {
        &self.motion
    }

    /// Latest matched bounding box.
    pub fn bbox(&self) -> Rect {
        self.history.back().copied().unwrap_or_default()
    }

    /// Latest box moved to the motion model's current position estimate.
    pub fn predicted_bbox(&self) -> Rect {
        let (cx, cy) = self.motion.position();
        self.bbox().recentered(cx, cy)
    }

    pub fn history(&self) -> impl Iterator<Item = &Rect> {
        self.history.iter()
    }

    /// Velocity estimate in pixels per frame.
    pub fn velocity_px(&self) -> (f64, f64) {
        self.motion.velocity()
    }

    pub fn targeting(&self) -> Option<&TargetingState> {
        self.targeting.as_ref()
    }

    /// Number of most recent consecutive matches, the current one included,
    /// whose confidence reached `threshold`. Bounded by the history length.
    pub fn confident_streak(&self, threshold: f32) -> u32 {
        let run = self
            .confidences
            .iter()
            .rev()
            .take_while(|&&c| c >= threshold)
            .count();
        (run as u32).min(self.hit_streak)
    }

    /// Targeting state, created on first use. A new state starts with the
    /// confident matches that preceded this frame, so frames spent Tentative
    /// count toward `min_track_frames`; the evaluator adds the current one.
    pub(crate) fn targeting_mut(&mut self, confidence_threshold: f32) -> &mut TargetingState {
        if self.targeting.is_none() {
            let prior = self.confident_streak(confidence_threshold).saturating_sub(1);
            self.targeting = Some(TargetingState {
                consecutive_frames: prior,
                ..TargetingState::default()
            });
        }
        self.targeting.get_or_insert_with(TargetingState::default)
    }

    pub(crate) fn predict(&mut self) {
        self.age += 1;
        self.motion.predict();
    }

    pub(crate) fn cost(&self, detection: &Detection) -> Result<f64, TrackingError> {
        self.motion
            .cost(detection.center())
            .map_err(|fault| TrackingError::numerical(self.id, fault.to_string()))
    }

    /// Apply a matched detection. Returns true when this match confirmed the track.
    pub(crate) fn mark_matched(
        &mut self,
        detection: &Detection,
        min_hits: u32,
    ) -> Result<bool, TrackingError> {
        self.motion
            .update(detection.center())
            .map_err(|fault| TrackingError::numerical(self.id, fault.to_string()))?;

        if self.history.len() == self.history_len {
            self.history.pop_front();
            self.confidences.pop_front();
        }
        self.history.push_back(detection.bbox);
        self.confidences.push_back(detection.confidence);

        self.hits += 1;
        self.hit_streak += 1;
        self.frames_since_seen = 0;
        self.last_seen_frame = detection.frame_number;
        self.last_seen = detection.timestamp;
        self.confidence = detection.confidence;
        self.class_id = detection.class_id;
        if detection.class_name.is_some() {
            self.class_name = detection.class_name.clone();
        }

        if self.state == TrackState::Tentative && self.hit_streak >= min_hits {
            self.state = TrackState::Confirmed;
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn mark_missed(&mut self) {
        self.frames_since_seen += 1;
        self.hit_streak = 0;
    }

    pub(crate) fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    #[cfg(test)]
    pub(crate) fn motion_mut(&mut self) -> &mut MotionModel {
        &mut self.motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KalmanParams;

    fn spawn(min_hits: u32, history_len: usize) -> Track {
        let filter = Arc::new(KalmanFilter::new(&KalmanParams::default()));
        let det = Detection::new(0.0, 0.0, 10.0, 10.0, 0.9);
        Track::spawn(7, &det, MotionKind::Centroid, &filter, history_len, min_hits)
    }

    #[test]
    fn test_spawn_is_tentative() {
        let track = spawn(3, 4);
        assert_eq!(track.id(), 7);
        assert_eq!(track.state(), TrackState::Tentative);
        assert_eq!(track.hits(), 1);
        assert_eq!(track.frames_since_seen(), 0);
        assert!(track.targeting().is_none());
    }

    #[test]
    fn test_spawn_confirmed_with_single_hit_requirement() {
        assert!(spawn(1, 4).is_confirmed());
    }

    #[test]
    fn test_confirmation_needs_consecutive_hits() {
        let mut track = spawn(3, 4);
        let det = Detection::new(1.0, 1.0, 11.0, 11.0, 0.9);

        assert!(!track.mark_matched(&det, 3).unwrap());
        track.mark_missed();
        assert_eq!(track.hit_streak(), 0);
        assert_eq!(track.frames_since_seen(), 1);

        assert!(!track.mark_matched(&det, 3).unwrap());
        assert_eq!(track.frames_since_seen(), 0);
        assert!(!track.mark_matched(&det, 3).unwrap());
        assert!(track.mark_matched(&det, 3).unwrap());
        assert!(track.is_confirmed());
        assert_eq!(track.hits(), 5);
    }

    #[test]
    fn test_history_is_bounded_newest_last() {
        let mut track = spawn(3, 3);
        for i in 1..=5 {
            let x = i as f32;
            track
                .mark_matched(&Detection::new(x, 0.0, x + 10.0, 10.0, 0.9), 3)
                .unwrap();
        }
        let xs: Vec<f32> = track.history().map(|r| r.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0]);
        assert_eq!(track.bbox().x, 5.0);
    }

    #[test]
    fn test_confident_streak_stops_at_gap_or_low_confidence() {
        let mut track = spawn(3, 8);
        let det = |c: f32| Detection::new(1.0, 1.0, 11.0, 11.0, c);

        track.mark_matched(&det(0.9), 3).unwrap();
        assert_eq!(track.confident_streak(0.85), 2);

        track.mark_missed();
        assert_eq!(track.confident_streak(0.85), 0);

        track.mark_matched(&det(0.9), 3).unwrap();
        track.mark_matched(&det(0.5), 3).unwrap();
        track.mark_matched(&det(0.95), 3).unwrap();
        assert_eq!(track.confident_streak(0.85), 1);
        assert_eq!(track.confident_streak(0.4), 3);
    }

    #[test]
    fn test_targeting_state_seeded_from_earlier_matches() {
        let mut track = spawn(3, 8);
        let det = Detection::new(1.0, 1.0, 11.0, 11.0, 0.9);
        track.mark_matched(&det, 3).unwrap();
        track.mark_matched(&det, 3).unwrap();

        // two earlier confident frames; the current one is left to the evaluator
        assert_eq!(track.targeting_mut(0.85).consecutive_frames(), 2);
        track.targeting_mut(0.85).consecutive_frames = 7;
        assert_eq!(track.targeting_mut(0.85).consecutive_frames(), 7);
    }

    #[test]
    fn test_predict_ages_track() {
        let mut track = spawn(3, 4);
        track.predict();
        track.predict();
        assert_eq!(track.age(), 2);
    }
}
