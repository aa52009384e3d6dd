mod detection;
mod kalman_filter;
mod matching;
mod motion;
mod rect;
mod track;
mod track_state;
mod track_store;

pub use detection::Detection;
pub use kalman_filter::{FilterFault, KalmanFilter, covariance_trace};
pub use matching::{Assignment, associate, cost_matrix, greedy_assignment};
pub use motion::{CentroidMotion, KalmanMotion, MotionModel};
pub use rect::Rect;
pub use track::Track;
pub use track_state::TrackState;
pub use track_store::{TrackStore, TrackingStep};
