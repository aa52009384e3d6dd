//! Rate-limited detection and engagement alerts.
//!
//! The pipeline owns an [`AlertDispatcher`] that hands events to a bounded
//! queue; a [`SinkWorker`] on another thread drains it into the configured
//! sinks.

mod dispatcher;
mod event;
mod sink;

use crossbeam::channel::{Receiver, Sender, bounded};

use crate::config::AlertConfig;

pub use dispatcher::{AlertDispatcher, DispatchStats};
pub use event::{AlertEvent, AlertKind, AlertPayload};
pub use sink::{AlertSink, ConsoleSink, DeliveryStats, JsonLinesSink, SinkWorker};

/// Bounded alert queue sized by `queue_capacity`.
pub fn channel(config: &AlertConfig) -> (Sender<AlertEvent>, Receiver<AlertEvent>) {
    bounded(config.queue_capacity)
}
