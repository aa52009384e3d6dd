//! Multi-object drone tracking with a safety-gated engagement decision engine.
//!
//! Detections arrive once per frame from an external inference backend. The
//! [`Pipeline`] associates them to tracks, evaluates the engagement envelope for
//! every confirmed track and hands rate-limited alerts to a bounded queue.
//!
//! ```
//! use intercept_rs::{Config, DetectionBuilder, Pipeline, alert};
//!
//! let config = Config::default();
//! let (tx, _rx) = alert::channel(&config.alerts);
//! let mut pipeline = Pipeline::new(config, tx).unwrap();
//!
//! let det = DetectionBuilder::new()
//!     .tlbr(100.0, 100.0, 140.0, 130.0)
//!     .confidence(0.92)
//!     .build();
//! let report = pipeline.process_frame(vec![det]);
//! assert_eq!(report.frame_number, 1);
//! assert_eq!(pipeline.store().len(), 1);
//! ```

pub mod alert;
pub mod clock;
pub mod config;
pub mod error;
pub mod integration;
pub mod targeting;
pub mod tracker;

pub use alert::{AlertDispatcher, AlertEvent, AlertKind, AlertSink, SinkWorker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AlertConfig, Config, MotionKind, TargetingConfig, TrackerConfig};
pub use error::{AlertError, ConfigError, DetectionError, TrackingError};
pub use integration::{DetectionBuilder, DetectionSource, FrameReport, Pipeline, StopHandle};
pub use targeting::{EngagementPhase, RejectReason, TargetingDecision, TargetingEvaluator};
pub use tracker::{Detection, Rect, Track, TrackState, TrackStore};
