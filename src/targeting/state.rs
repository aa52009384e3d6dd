//! Per-track engagement state and the decisions it produces.

use std::fmt;
use std::time::Duration;

use crate::clock::within;

/// Engagement phase of one confirmed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum EngagementPhase {
    #[default]
    BelowThreshold,
    Tracking,
    ReadyToEngage,
    Engaged,
    Cooldown,
}

/// Why a track that passed the confidence gate may not be engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RejectReason {
    NotArmed,
    OutOfRange,
    TooFast,
    Cooldown,
    /// Fire signal for a track that is not ReadyToEngage
    NotReady,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotArmed => write!(f, "system not armed"),
            Self::OutOfRange => write!(f, "target outside range envelope"),
            Self::TooFast => write!(f, "target too fast"),
            Self::Cooldown => write!(f, "engagement cooldown active"),
            Self::NotReady => write!(f, "target not ready to engage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TargetingDecision {
    Hold,
    Ready,
    Engage,
    Reject(RejectReason),
}

impl TargetingDecision {
    /// Ready or Engage.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Ready | Self::Engage)
    }
}

/// Targeting bookkeeping owned by a single track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetingState {
    pub(crate) consecutive_frames: u32,
    pub(crate) distance_m: Option<f64>,
    pub(crate) velocity_mps: Option<f64>,
    pub(crate) phase: EngagementPhase,
    pub(crate) last_engaged: Option<Duration>,
}

impl TargetingState {
    /// Consecutive frames with confidence at or above the threshold.
    pub fn consecutive_frames(&self) -> u32 {
        self.consecutive_frames
    }

    pub fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }

    pub fn velocity_mps(&self) -> Option<f64> {
        self.velocity_mps
    }

    pub fn phase(&self) -> EngagementPhase {
        self.phase
    }

    pub fn last_engaged(&self) -> Option<Duration> {
        self.last_engaged
    }

    pub(crate) fn in_cooldown(&self, now: Duration, window: Duration) -> bool {
        within(self.last_engaged, now, window)
    }
}

/// System-wide engagement clock owned by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalCooldown {
    last_engaged: Option<Duration>,
}

impl GlobalCooldown {
    pub fn last_engaged(&self) -> Option<Duration> {
        self.last_engaged
    }

    pub fn is_active(&self, now: Duration, window: Duration) -> bool {
        within(self.last_engaged, now, window)
    }

    pub(crate) fn arm(&mut self, now: Duration) {
        self.last_engaged = Some(now);
    }
}
