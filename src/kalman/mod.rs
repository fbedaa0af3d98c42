// Kalman filter module
// Unscented Kalman filter with a CTRV motion model, fusing lidar and radar

pub mod filter;
pub mod motion;
pub mod sensor;
pub mod unscented;

pub use filter::{ProcessOutcome, StateCovariance, StateVector, UnscentedKalmanFilter};
pub use unscented::{normalize_angle, Moments};
