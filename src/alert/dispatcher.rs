//! Rate limiting in front of the alert queue.
//!
//! The dispatcher never blocks: an event is either suppressed by a cooldown,
//! handed to the bounded queue, or dropped because the queue is full or
//! closed. Suppressed and dropped events are not retried.

use std::collections::HashMap;
use std::time::Duration;

use crossbeam::channel::{Sender, TrySendError};

use crate::alert::event::{AlertEvent, AlertKind};
use crate::clock::within;
use crate::config::AlertConfig;
use crate::targeting::TargetingDecision;
use crate::tracker::{Detection, Track};

/// Per-track entries older than this many windows are forgotten.
const STALE_WINDOWS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub emitted: u64,
    /// Rejected by a cooldown
    pub suppressed: u64,
    /// Queue full or closed
    pub dropped: u64,
}

pub struct AlertDispatcher {
    config: AlertConfig,
    outlet: Sender<AlertEvent>,
    last_any: Option<Duration>,
    last_detection: HashMap<Option<u64>, Duration>,
    last_engagement: HashMap<u64, Duration>,
    last_engagement_any: Option<Duration>,
    stats: DispatchStats,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig, outlet: Sender<AlertEvent>) -> Self {
        Self {
            config,
            outlet,
            last_any: None,
            last_detection: HashMap::new(),
            last_engagement: HashMap::new(),
            last_engagement_any: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Detection alert, subject to the global and per-track alert cooldowns.
    /// Returns true when the event was queued.
    pub fn notify_detection(
        &mut self,
        detection: &Detection,
        track_id: Option<u64>,
        now: Duration,
    ) -> bool {
        self.dispatch(AlertEvent::detection(detection, track_id, now))
    }

    /// Engagement alert. Only an `Engage` decision produces an event.
    pub fn notify_engagement(
        &mut self,
        track: &Track,
        decision: &TargetingDecision,
        frame_number: u64,
        now: Duration,
    ) -> bool {
        if *decision != TargetingDecision::Engage {
            return false;
        }
        self.dispatch(AlertEvent::engagement(track, frame_number, now))
    }

    fn dispatch(&mut self, event: AlertEvent) -> bool {
        let now = event.timestamp;
        let kind = event.kind;
        let track_id = event.track_id;
        self.prune_stale(now);

        if let Some(reason) = self.cooldown_reason(kind, track_id, now) {
            log::debug!("suppressed {:?} alert for track {:?}: {}", kind, track_id, reason);
            self.stats.suppressed += 1;
            return false;
        }

        match self.outlet.try_send(event) {
            Ok(()) => {
                self.record(kind, track_id, now);
                self.stats.emitted += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("alert queue full, dropping {:?} alert for track {:?}", kind, track_id);
                self.stats.dropped += 1;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("alert queue closed, dropping {:?} alert for track {:?}", kind, track_id);
                self.stats.dropped += 1;
                false
            }
        }
    }

    fn cooldown_reason(
        &self,
        kind: AlertKind,
        track_id: Option<u64>,
        now: Duration,
    ) -> Option<&'static str> {
        if within(self.last_any, now, self.config.global_cooldown()) {
            return Some("global alert cooldown");
        }
        match kind {
            AlertKind::Detection => {
                let last = self.last_detection.get(&track_id).copied();
                within(last, now, self.config.per_track_cooldown()).then_some("track alert cooldown")
            }
            AlertKind::Engagement => {
                let last = track_id.and_then(|id| self.last_engagement.get(&id).copied());
                if within(last, now, self.config.engagement_per_track_cooldown()) {
                    Some("track engagement cooldown")
                } else if within(
                    self.last_engagement_any,
                    now,
                    self.config.engagement_global_cooldown(),
                ) {
                    Some("global engagement cooldown")
                } else {
                    None
                }
            }
        }
    }

    fn record(&mut self, kind: AlertKind, track_id: Option<u64>, now: Duration) {
        self.last_any = Some(now);
        match kind {
            AlertKind::Detection => {
                self.last_detection.insert(track_id, now);
            }
            AlertKind::Engagement => {
                if let Some(id) = track_id {
                    self.last_engagement.insert(id, now);
                }
                self.last_engagement_any = Some(now);
            }
        }
    }

    fn prune_stale(&mut self, now: Duration) {
        let detection_horizon = self.config.per_track_cooldown().saturating_mul(STALE_WINDOWS);
        self.last_detection
            .retain(|_, &mut t| now.saturating_sub(t) < detection_horizon);
        let engagement_horizon = self
            .config
            .engagement_per_track_cooldown()
            .saturating_mul(STALE_WINDOWS);
        self.last_engagement
            .retain(|_, &mut t| now.saturating_sub(t) < engagement_horizon);
    }

    #[cfg(test)]
    fn tracked_entries(&self) -> usize {
        self.last_detection.len() + self.last_engagement.len()
    }
}
