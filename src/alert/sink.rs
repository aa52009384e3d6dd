//! Alert delivery backends and the worker thread that drives them.
//!
//! Delivery runs off the frame thread. A failing sink is logged and skipped;
//! it never reaches the pipeline.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel::{Receiver, Sender, bounded};

use crate::alert::event::{AlertEvent, AlertKind};
use crate::error::AlertError;

/// A delivery backend. Webhooks and other transports live in the host
/// application and plug in through this trait.
pub trait AlertSink: Send {
    fn deliver(&mut self, event: &AlertEvent) -> Result<(), AlertError>;

    fn flush(&mut self) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Writes alerts as log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn deliver(&mut self, event: &AlertEvent) -> Result<(), AlertError> {
        let p = &event.payload;
        match event.kind {
            AlertKind::Detection => log::info!(
                "ALERT detection track={:?} frame={} conf={:.2} class={}",
                event.track_id,
                event.frame_number,
                p.confidence,
                p.class_name.as_deref().unwrap_or("unknown"),
            ),
            AlertKind::Engagement => log::warn!(
                "ALERT engagement track={:?} frame={} distance={:?}m velocity={:?}m/s",
                event.track_id,
                event.frame_number,
                p.distance_m,
                p.velocity_mps,
            ),
        }
        Ok(())
    }
}

/// Appends one JSON object per alert to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    flush_every: usize,
    pending: usize,
}

impl JsonLinesSink {
    const DEFAULT_FLUSH_EVERY: usize = 10;

    /// Open `path` for appending, creating it if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, AlertError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            flush_every: Self::DEFAULT_FLUSH_EVERY,
            pending: 0,
        })
    }

    /// Flush after this many buffered events (minimum 1).
    pub fn with_flush_every(mut self, events: usize) -> Self {
        self.flush_every = events.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertSink for JsonLinesSink {
    fn deliver(&mut self, event: &AlertEvent) -> Result<(), AlertError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AlertError> {
        self.writer.flush()?;
        self.pending = 0;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains the alert queue on a dedicated thread and fans every event out to
/// all sinks.
pub struct SinkWorker {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<DeliveryStats>>,
}

impl SinkWorker {
    pub fn spawn(
        events: Receiver<AlertEvent>,
        sinks: Vec<Box<dyn AlertSink>>,
    ) -> Result<Self, AlertError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("alert-sink".to_string())
            .spawn(move || run_worker(events, stop_rx, sinks))?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Deliver whatever is still queued, flush every sink and join the thread.
    pub fn shutdown(mut self) -> DeliveryStats {
        self.stop()
    }

    fn stop(&mut self) -> DeliveryStats {
        // closing the stop channel wakes the worker
        self.stop_tx.take();
        match self.handle.take().map(thread::JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("alert sink worker panicked");
                DeliveryStats::default()
            }
            None => DeliveryStats::default(),
        }
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    events: Receiver<AlertEvent>,
    stop: Receiver<()>,
    mut sinks: Vec<Box<dyn AlertSink>>,
) -> DeliveryStats {
    log::debug!("alert sink worker started with {} sinks", sinks.len());
    let mut stats = DeliveryStats::default();

    loop {
        crossbeam::select! {
            recv(events) -> msg => match msg {
                Ok(event) => deliver_all(&mut sinks, &event, &mut stats),
                Err(_) => break,
            },
            recv(stop) -> _ => {
                for event in events.try_iter() {
                    deliver_all(&mut sinks, &event, &mut stats);
                }
                break;
            }
        }
    }

    for sink in sinks.iter_mut() {
        if let Err(e) = sink.flush() {
            log::error!("alert sink flush failed: {}", e);
        }
    }
    log::debug!(
        "alert sink worker stopped: {} delivered, {} failed",
        stats.delivered,
        stats.failed
    );
    stats
}

fn deliver_all(sinks: &mut [Box<dyn AlertSink>], event: &AlertEvent, stats: &mut DeliveryStats) {
    for sink in sinks.iter_mut() {
        match sink.deliver(event) {
            Ok(()) => stats.delivered += 1,
            Err(e) => {
                stats.failed += 1;
                log::error!(
                    "alert delivery failed for track {:?} frame {}: {}",
                    event.track_id,
                    event.frame_number,
                    e
                );
            }
        }
    }
}
