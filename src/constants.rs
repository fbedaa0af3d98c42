// Shared constants for the CTRV unscented Kalman filter

/// State dimension: [px, py, v, yaw, yaw_rate]
pub const N_X: usize = 5;

/// Augmented state dimension: state + longitudinal and yaw acceleration noise
pub const N_AUG: usize = N_X + 2;

/// Number of sigma points generated from the augmented state
pub const N_SIGMA: usize = 2 * N_AUG + 1;

/// Index of the heading component in the state vector
pub const YAW_INDEX: usize = 3;

/// Index of the bearing component in a range/bearing measurement
pub const BEARING_INDEX: usize = 1;

/// Sigma point spreading parameter. lambda = 3 - n_aug
pub const LAMBDA: f64 = 3.0 - N_AUG as f64;

/// Below this |yaw_rate| the motion model uses the straight-line limit (rad/s)
pub const YAW_RATE_THRESHOLD: f64 = 1e-3;

/// Smallest radius used as a divisor in the range-rate model (m)
pub const RADIUS_FLOOR: f64 = 1e-4;

/// Smallest diagonal jitter added to an ill-conditioned innovation covariance
pub const INNOVATION_JITTER: f64 = 1e-9;

/// Jitter relative to the innovation covariance norm, used when larger
/// than `INNOVATION_JITTER`
pub const INNOVATION_RELATIVE_JITTER: f64 = 1e-9;

/// Largest accepted condition estimate ||S|| * ||S^-1|| (Frobenius norms)
pub const INNOVATION_MAX_CONDITION: f64 = 1e12;

/// Microseconds per second
pub const US_PER_SECOND: f64 = 1e6;

/// 95% chi-square threshold with 2 degrees of freedom (lidar NIS)
pub const CHI2_95_2DOF: f64 = 5.991;

/// 95% chi-square threshold with 3 degrees of freedom (radar NIS)
pub const CHI2_95_3DOF: f64 = 7.815;

// --- Default noise parameters ---

/// Process noise std-dev, longitudinal acceleration (m/s^2)
pub const DEFAULT_STD_A: f64 = 2.0;

/// Process noise std-dev, yaw acceleration (rad/s^2)
pub const DEFAULT_STD_YAWDD: f64 = 2.0;

/// Lidar noise std-dev, x position (m)
pub const DEFAULT_STD_LASER_PX: f64 = 0.15;

/// Lidar noise std-dev, y position (m)
pub const DEFAULT_STD_LASER_PY: f64 = 0.15;

/// Radar noise std-dev, range (m)
pub const DEFAULT_STD_RADAR_R: f64 = 0.3;

/// Radar noise std-dev, bearing (rad)
pub const DEFAULT_STD_RADAR_PHI: f64 = 0.03;

/// Radar noise std-dev, range rate (m/s)
pub const DEFAULT_STD_RADAR_RD: f64 = 0.3;

/// Prior state guess; position is overwritten by the first measurement
pub const DEFAULT_PRIOR_MEAN: [f64; N_X] = [1.0, 1.0, 1.0, 1.0, 0.1];

/// Prior covariance diagonal: tight on position, unit on unobserved terms
pub const DEFAULT_PRIOR_VARIANCE: [f64; N_X] = [0.15, 0.15, 1.0, 1.0, 1.0];
