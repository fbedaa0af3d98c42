// Error types for the estimator, configuration, metrics and input parsing

use thiserror::Error;

/// Failures raised by a predict/update cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// The augmented covariance could not be Cholesky-factored. The filter
    /// session has degenerated and should be reset.
    #[error("augmented covariance is not positive definite")]
    CovarianceNotPositiveDefinite,

    /// Innovation covariance stayed singular after regularization
    #[error("innovation covariance is singular ({sensor})")]
    SingularInnovation { sensor: &'static str },
}

/// Invalid filter configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidStdDev { name: &'static str, value: f64 },

    #[error("prior variance [{index}] must be finite and positive, got {value}")]
    InvalidPriorVariance { index: usize, value: f64 },

    #[error("prior mean [{index}] must be finite, got {value}")]
    InvalidPriorMean { index: usize, value: f64 },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accuracy metric input violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("no estimations to score")]
    Empty,

    #[error("{estimations} estimations but {ground_truth} ground truth values")]
    LengthMismatch {
        estimations: usize,
        ground_truth: usize,
    },
}

/// Malformed line in a measurement input file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: unknown sensor tag '{tag}'")]
    UnknownSensor { line: usize, tag: String },

    #[error("line {line}: expected at least {expected} fields, found {found}")]
    MissingFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid number '{value}'")]
    InvalidNumber { line: usize, value: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}
