//! Engagement decisions for confirmed tracks.
//!
//! This module only signals eligibility. Driving an actuator is the job of
//! whoever consumes [`TargetingDecision::Engage`].

mod distance;
mod evaluator;
mod state;

pub use distance::{RangeEstimator, lead_point};
pub use evaluator::{EngagementContext, TargetInput, TargetingEvaluator};
pub use state::{EngagementPhase, GlobalCooldown, RejectReason, TargetingDecision, TargetingState};
