//! Owner of the live track set.

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::error::TrackingError;
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, Assignment};
use crate::tracker::track::Track;
use crate::tracker::track_state::TrackState;

/// Everything that happened to the store during one [`TrackStore::step`].
#[derive(Debug, Clone, Default)]
pub struct TrackingStep {
    pub assignment: Assignment,
    /// Tracks confirmed by this frame's matches
    pub confirmed: Vec<u64>,
    pub spawned: Vec<u64>,
    /// Numerical failures; the affected tracks were removed
    pub failures: Vec<TrackingError>,
    pub pruned: Vec<Track>,
}

pub struct TrackStore {
    /// Live tracks in ascending id order
    tracks: Vec<Track>,
    next_id: u64,
    config: TrackerConfig,
    kalman_filter: Arc<KalmanFilter>,
}

impl TrackStore {
    pub fn new(config: TrackerConfig) -> Self {
        let kalman_filter = Arc::new(KalmanFilter::new(&config.kalman));
        Self {
            tracks: Vec::new(),
            next_id: 1,
            config,
            kalman_filter,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: u64) -> Option<&Track> {
        self.index_of(id).map(|i| &self.tracks[i])
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut Track> {
        let i = self.index_of(id)?;
        Some(&mut self.tracks[i])
    }

    fn index_of(&self, id: u64) -> Option<usize> {
        self.tracks.binary_search_by_key(&id, Track::id).ok()
    }

    /// Advance every track's motion model by one frame.
    pub fn predict_all(&mut self) {
        for track in self.tracks.iter_mut() {
            track.predict();
        }
    }

    pub fn associate(&self, detections: &[Detection]) -> Assignment {
        matching::associate(detections, &self.tracks, self.config.gate())
    }

    /// Update matched tracks, age unmatched ones and mark faulted ones Lost.
    /// Returns the ids of tracks confirmed by this call plus any numerical
    /// failures; failed tracks are removed on the next [`prune`](Self::prune).
    pub fn apply_matches(
        &mut self,
        detections: &[Detection],
        assignment: &Assignment,
    ) -> (Vec<u64>, Vec<TrackingError>) {
        let min_hits = self.config.min_hits;
        let mut confirmed = Vec::new();
        let mut failures = Vec::new();

        for &(det_idx, track_id) in &assignment.matches {
            let Some(track) = self.get_mut(track_id) else {
                continue;
            };
            match track.mark_matched(&detections[det_idx], min_hits) {
                Ok(true) => {
                    log::info!(
                        "track {} confirmed at frame {}",
                        track_id,
                        detections[det_idx].frame_number
                    );
                    confirmed.push(track_id);
                }
                Ok(false) => {}
                Err(err) => {
                    track.mark_lost();
                    failures.push(err);
                }
            }
        }

        for &track_id in &assignment.unmatched_tracks {
            if let Some(track) = self.get_mut(track_id) {
                track.mark_missed();
            }
        }

        for err in &assignment.faulted_tracks {
            let TrackingError::NumericalFailure { track_id, .. } = err;
            if let Some(track) = self.get_mut(*track_id) {
                track.mark_lost();
            }
            failures.push(err.clone());
        }

        (confirmed, failures)
    }

    /// Start a new Tentative track. Ids are never reused.
    pub fn spawn(&mut self, detection: &Detection) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.push(Track::spawn(
            id,
            detection,
            self.config.motion,
            &self.kalman_filter,
            self.config.history_len,
            self.config.min_hits,
        ));
        id
    }

    /// Remove tracks that went unmatched for more than `max_disappeared`
    /// frames, plus tracks already marked Lost. Removed tracks are returned
    /// in the Lost state.
    pub fn prune(&mut self) -> Vec<Track> {
        let max_disappeared = self.config.max_disappeared;
        let mut removed = Vec::new();
        self.tracks.retain_mut(|track| {
            if track.frames_since_seen() > max_disappeared {
                track.mark_lost();
            }
            if track.state() == TrackState::Lost {
                log::debug!(
                    "pruning track {} after {} unmatched frames (last seen frame {} at {:?})",
                    track.id(),
                    track.frames_since_seen(),
                    track.last_seen_frame(),
                    track.last_seen()
                );
                removed.push(track.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn confirmed_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_confirmed())
    }

    pub(crate) fn confirmed_tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut().filter(|t| t.is_confirmed())
    }

    /// One tracking cycle: predict, associate, update, spawn, prune.
    pub fn step(&mut self, detections: &[Detection]) -> TrackingStep {
        self.predict_all();
        let assignment = self.associate(detections);
        let (confirmed, failures) = self.apply_matches(detections, &assignment);
        let spawned = assignment
            .unmatched_detections
            .iter()
            .map(|&idx| self.spawn(&detections[idx]))
            .collect();
        let pruned = self.prune();

        TrackingStep {
            assignment,
            confirmed,
            spawned,
            failures,
            pruned,
        }
    }
}
