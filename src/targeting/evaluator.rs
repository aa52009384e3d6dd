//! Engagement state machine.
//!
//! Per frame, for every confirmed track:
//!
//! 1. refresh range, speed and the consecutive-confidence counter; a frame
//!    without a matched detection counts as not confident;
//! 2. inside the per-track cooldown: `Reject(Cooldown)`;
//! 3. confidence below threshold: `Hold`, phase `BelowThreshold`;
//! 4. fewer than `min_track_frames` confident frames: `Hold`, phase `Tracking`;
//! 5. first failing of armed, range, speed: `Reject(..)`, phase `Tracking`;
//! 6. otherwise `Ready`, phase `ReadyToEngage`.
//!
//! Engagement itself only happens through [`TargetingEvaluator::engage`],
//! the explicit fire signal.

use std::time::Duration;

use crate::config::TargetingConfig;
use crate::targeting::distance::RangeEstimator;
use crate::targeting::state::{
    EngagementPhase, GlobalCooldown, RejectReason, TargetingDecision, TargetingState,
};
use crate::tracker::{Rect, Track};

/// Measurements the evaluator needs from a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInput {
    pub bbox: Rect,
    pub confidence: f32,
    /// Image-plane velocity, pixels/frame
    pub velocity_px: (f64, f64),
    /// A detection was associated to the track this frame.
    pub matched: bool,
}

impl TargetInput {
    pub fn from_track(track: &Track) -> Self {
        Self {
            bbox: track.bbox(),
            confidence: track.confidence(),
            velocity_px: track.velocity_px(),
            matched: track.frames_since_seen() == 0,
        }
    }
}

/// Frame-wide inputs supplied by the pipeline coordinator.
#[derive(Debug)]
pub struct EngagementContext<'a> {
    pub armed: bool,
    pub now: Duration,
    pub global: &'a mut GlobalCooldown,
}

#[derive(Debug, Clone)]
pub struct TargetingEvaluator {
    config: TargetingConfig,
    range: RangeEstimator,
}

impl TargetingEvaluator {
    pub fn new(config: TargetingConfig) -> Self {
        let range = RangeEstimator::from_config(&config);
        Self { config, range }
    }

    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        state: &mut TargetingState,
        input: &TargetInput,
        ctx: &EngagementContext<'_>,
    ) -> TargetingDecision {
        let distance_m = self.range.distance_m(&input.bbox);
        let velocity_mps = self.range.velocity_mps(input.velocity_px, distance_m);
        state.distance_m = Some(distance_m);
        state.velocity_mps = Some(velocity_mps);

        // a coasting track repeats its last confidence; it is not a new observation
        let confident = input.matched && input.confidence >= self.config.confidence_threshold;
        if confident {
            state.consecutive_frames = state.consecutive_frames.saturating_add(1);
        } else {
            state.consecutive_frames = 0;
        }

        if state.in_cooldown(ctx.now, self.config.engagement_cooldown()) {
            state.phase = EngagementPhase::Cooldown;
            return TargetingDecision::Reject(RejectReason::Cooldown);
        }

        if !confident {
            state.phase = EngagementPhase::BelowThreshold;
            return TargetingDecision::Hold;
        }

        if state.consecutive_frames < self.config.min_track_frames {
            state.phase = EngagementPhase::Tracking;
            return TargetingDecision::Hold;
        }

        if let Some(reason) = self.envelope_violation(ctx.armed, distance_m, velocity_mps) {
            state.phase = EngagementPhase::Tracking;
            return TargetingDecision::Reject(reason);
        }

        state.phase = EngagementPhase::ReadyToEngage;
        TargetingDecision::Ready
    }

    /// Explicit fire signal. Only a track in ReadyToEngage, with the system
    /// armed and neither cooldown running, becomes Engaged; both cooldown
    /// clocks start at `ctx.now`.
    pub fn engage(
        &self,
        state: &mut TargetingState,
        ctx: &mut EngagementContext<'_>,
    ) -> TargetingDecision {
        if state.in_cooldown(ctx.now, self.config.engagement_cooldown())
            || ctx
                .global
                .is_active(ctx.now, self.config.global_engagement_cooldown())
        {
            return TargetingDecision::Reject(RejectReason::Cooldown);
        }
        if state.phase != EngagementPhase::ReadyToEngage {
            return TargetingDecision::Reject(RejectReason::NotReady);
        }
        if !ctx.armed {
            return TargetingDecision::Reject(RejectReason::NotArmed);
        }

        state.phase = EngagementPhase::Engaged;
        state.last_engaged = Some(ctx.now);
        ctx.global.arm(ctx.now);
        TargetingDecision::Engage
    }

    /// First failing envelope condition, checked in the order armed, range, speed.
    fn envelope_violation(
        &self,
        armed: bool,
        distance_m: f64,
        velocity_mps: f64,
    ) -> Option<RejectReason> {
        if !armed {
            return Some(RejectReason::NotArmed);
        }
        if !(distance_m >= self.config.min_range_m && distance_m <= self.config.max_range_m) {
            return Some(RejectReason::OutOfRange);
        }
        if !(velocity_mps <= self.config.max_velocity_mps) {
            return Some(RejectReason::TooFast);
        }
        None
    }
}
