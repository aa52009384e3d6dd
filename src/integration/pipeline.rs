//! Frame-cycle coordinator combining tracking, targeting and alerting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::Sender;
use serde::Serialize;

use crate::alert::{AlertDispatcher, AlertEvent, DispatchStats};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{ConfigError, DetectionError};
use crate::targeting::{
    EngagementContext, EngagementPhase, GlobalCooldown, RejectReason, TargetInput,
    TargetingDecision, TargetingEvaluator, lead_point,
};
use crate::tracker::{Detection, Rect, Track, TrackStore};

use super::DetectionSource;

/// Cooperative stop signal, checked by [`Pipeline::run`] between frames.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Renderer-facing view of one confirmed track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: u64,
    /// Last matched box
    pub bbox: Rect,
    /// Box at the motion model's current estimate; differs from `bbox` while coasting
    pub predicted_bbox: Rect,
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: Option<String>,
    pub distance_m: Option<f64>,
    pub velocity_mps: Option<f64>,
    pub phase: EngagementPhase,
    /// Predicted interception point, pixels
    pub lead_point: (f64, f64),
}

impl TrackSnapshot {
    fn from_track(track: &Track, lead_factor: f64) -> Self {
        let targeting = track.targeting();
        Self {
            id: track.id(),
            bbox: track.bbox(),
            predicted_bbox: track.predicted_bbox(),
            confidence: track.confidence(),
            class_id: track.class_id(),
            class_name: track.class_name().map(str::to_owned),
            distance_m: targeting.and_then(|t| t.distance_m()),
            velocity_mps: targeting.and_then(|t| t.velocity_mps()),
            phase: targeting.map(|t| t.phase()).unwrap_or_default(),
            lead_point: lead_point(track.bbox().center(), track.velocity_px(), lead_factor),
        }
    }
}

/// Result of one frame cycle.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_number: u64,
    /// Clock reading used for every cooldown comparison in this frame
    pub timestamp: Duration,
    /// Confirmed tracks after the cycle, ascending id
    pub tracks: Vec<TrackSnapshot>,
    pub decisions: Vec<(u64, TargetingDecision)>,
    /// Input index and reason of every detection dropped at ingestion
    pub rejected_detections: Vec<(usize, DetectionError)>,
    /// Ids removed from the store this frame
    pub pruned: Vec<u64>,
}

impl FrameReport {
    pub fn decision_for(&self, track_id: u64) -> Option<TargetingDecision> {
        self.decisions
            .iter()
            .find(|(id, _)| *id == track_id)
            .map(|&(_, decision)| decision)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub detections_rejected: u64,
    pub tracks_created: u64,
    pub tracks_pruned: u64,
    pub engagements: u64,
}

/// Owns the track store, the arm flag and the engagement clocks, and runs the
/// strictly ordered per-frame cycle:
/// predict, associate, update/spawn, prune, evaluate, dispatch.
pub struct Pipeline<C: Clock = SystemClock> {
    config: Config,
    store: TrackStore,
    evaluator: TargetingEvaluator,
    dispatcher: AlertDispatcher,
    clock: C,
    armed: bool,
    global: GlobalCooldown,
    /// Fire signals applied during the next targeting stage
    fire_requests: Vec<u64>,
    frame_number: u64,
    stop: StopHandle,
    stats: PipelineStats,
}

impl Pipeline<SystemClock> {
    /// Validate `config` and build a pipeline that hands alerts to `alerts`.
    pub fn new(config: Config, alerts: Sender<AlertEvent>) -> Result<Self, ConfigError> {
        Self::with_clock(config, alerts, SystemClock::new())
    }
}

impl<C: Clock> Pipeline<C> {
    pub fn with_clock(
        config: Config,
        alerts: Sender<AlertEvent>,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: TrackStore::new(config.tracker.clone()),
            evaluator: TargetingEvaluator::new(config.targeting.clone()),
            dispatcher: AlertDispatcher::new(config.alerts.clone(), alerts),
            armed: config.targeting.armed,
            config,
            clock,
            global: GlobalCooldown::default(),
            fire_requests: Vec::new(),
            frame_number: 0,
            stop: StopHandle::default(),
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub fn global_cooldown(&self) -> GlobalCooldown {
        self.global
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm the system. Refused while engagement is disabled in the config.
    pub fn arm(&mut self) -> bool {
        if !self.config.targeting.engagement_enabled {
            log::warn!("arm request refused: engagement is disabled");
            return false;
        }
        if !self.armed {
            log::warn!("system ARMED at frame {}", self.frame_number);
        }
        self.armed = true;
        true
    }

    pub fn disarm(&mut self) {
        if self.armed {
            log::info!("system disarmed at frame {}", self.frame_number);
        }
        self.armed = false;
    }

    /// Queue an explicit fire signal for `track_id`, applied during the next
    /// frame's targeting stage.
    pub fn request_engagement(&mut self, track_id: u64) {
        if !self.fire_requests.contains(&track_id) {
            self.fire_requests.push(track_id);
        }
    }

    /// Run one complete frame cycle. Never interrupted part way through.
    pub fn process_frame(&mut self, detections: Vec<Detection>) -> FrameReport {
        self.frame_number += 1;
        let frame = self.frame_number;
        let now = self.clock.now();

        let (accepted, rejected_detections) = self.ingest(detections, frame);

        let step = self.store.step(&accepted);
        for failure in &step.failures {
            log::warn!("frame {}: {}; track dropped", frame, failure);
        }
        self.stats.tracks_created += step.spawned.len() as u64;
        self.stats.tracks_pruned += step.pruned.len() as u64;

        let decisions = self.evaluate_targets(frame, now);

        // Engagement alerts go first so detection alerts in the same frame
        // cannot take the global alert slot ahead of them.
        for &(track_id, decision) in &decisions {
            if decision != TargetingDecision::Engage {
                continue;
            }
            if let Some(track) = self.store.get(track_id) {
                self.dispatcher.notify_engagement(track, &decision, frame, now);
            }
        }
        let assigned = step.assignment.matches.iter().copied().chain(
            step.assignment
                .unmatched_detections
                .iter()
                .copied()
                .zip(step.spawned.iter().copied()),
        );
        for (det_idx, track_id) in assigned {
            self.dispatcher
                .notify_detection(&accepted[det_idx], Some(track_id), now);
        }

        self.stats.frames += 1;
        let lead_factor = self.config.targeting.lead_factor;
        FrameReport {
            frame_number: frame,
            timestamp: now,
            tracks: self
                .store
                .confirmed_tracks()
                .map(|t| TrackSnapshot::from_track(t, lead_factor))
                .collect(),
            decisions,
            rejected_detections,
            pruned: step.pruned.iter().map(Track::id).collect(),
        }
    }

    /// Pull frames from `source` until it is exhausted, fails, or the stop
    /// handle is set. Returns the number of frames processed.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<u64, S::Error>
    where
        S: DetectionSource,
        F: FnMut(&FrameReport),
    {
        log::info!("pipeline started (armed: {})", self.armed);
        let mut processed = 0;
        while !self.stop.is_stopped() {
            let detections = match source.next_detections() {
                Ok(Some(detections)) => detections,
                Ok(None) => break,
                Err(e) => {
                    log::info!("pipeline stopped after {} frames: source failed", processed);
                    return Err(e);
                }
            };
            let report = self.process_frame(detections);
            on_frame(&report);
            processed += 1;
        }
        log::info!("pipeline stopped after {} frames", processed);
        Ok(processed)
    }

    /// Stamp detections with the frame number and drop malformed ones.
    fn ingest(
        &mut self,
        detections: Vec<Detection>,
        frame: u64,
    ) -> (Vec<Detection>, Vec<(usize, DetectionError)>) {
        let mut accepted = Vec::with_capacity(detections.len());
        let mut rejected = Vec::new();
        for (idx, mut detection) in detections.into_iter().enumerate() {
            detection.frame_number = frame;
            match detection.validate() {
                Ok(()) => accepted.push(detection),
                Err(e) => {
                    log::warn!("frame {}: rejected detection {}: {}", frame, idx, e);
                    rejected.push((idx, e));
                }
            }
        }
        self.stats.detections_rejected += rejected.len() as u64;
        (accepted, rejected)
    }

    fn evaluate_targets(&mut self, frame: u64, now: Duration) -> Vec<(u64, TargetingDecision)> {
        let mut requests = std::mem::take(&mut self.fire_requests);
        let armed = self.armed;
        let evaluator = &self.evaluator;
        let threshold = evaluator.config().confidence_threshold;
        let global = &mut self.global;
        let mut decisions = Vec::new();

        for track in self.store.confirmed_tracks_mut() {
            let id = track.id();
            let input = TargetInput::from_track(track);
            let mut ctx = EngagementContext {
                armed,
                now,
                global: &mut *global,
            };
            let state = track.targeting_mut(threshold);
            let before = state.phase();

            let mut decision = evaluator.evaluate(state, &input, &ctx);
            if let Some(pos) = requests.iter().position(|&r| r == id) {
                requests.swap_remove(pos);
                decision = evaluator.engage(state, &mut ctx);
                match decision {
                    TargetingDecision::Engage => log::warn!(
                        "frame {}: ENGAGE track {} at {:.1} m",
                        frame,
                        id,
                        state.distance_m().unwrap_or(f64::NAN)
                    ),
                    other => log::info!(
                        "frame {}: fire signal for track {} refused: {:?}",
                        frame,
                        id,
                        other
                    ),
                }
            }
            if state.phase() != before {
                log::debug!(
                    "frame {}: track {} {:?} -> {:?}",
                    frame,
                    id,
                    before,
                    state.phase()
                );
            }
            decisions.push((id, decision));
        }

        for id in requests {
            log::info!(
                "frame {}: fire signal for track {} refused: no such confirmed track",
                frame,
                id
            );
            decisions.push((id, TargetingDecision::Reject(RejectReason::NotReady)));
        }

        self.stats.engagements += decisions
            .iter()
            .filter(|(_, d)| *d == TargetingDecision::Engage)
            .count() as u64;
        decisions
    }
}
