// Sensor measurement types fed to the estimator

use nalgebra::{Vector2, Vector3, Vector4};
use serde::Serialize;

/// Which sensor produced a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Modality {
    /// Linear position sensor (lidar): px, py
    Linear,
    /// Nonlinear range/bearing/range-rate sensor (radar)
    RangeBearing,
}

impl Modality {
    /// Single-letter tag used by the text input and output formats
    pub fn tag(self) -> char {
        match self {
            Modality::Linear => 'L',
            Modality::RangeBearing => 'R',
        }
    }
}

/// Raw observation, shaped by the sensor that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// [px, py] in metres
    Linear(Vector2<f64>),
    /// [rho (m), phi (rad), rho_dot (m/s)]
    RangeBearing(Vector3<f64>),
}

/// A single timestamped observation. The estimator only reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub reading: Reading,
    /// Capture time in microseconds
    pub timestamp_us: i64,
}

impl Measurement {
    pub fn linear(px: f64, py: f64, timestamp_us: i64) -> Self {
        Self {
            reading: Reading::Linear(Vector2::new(px, py)),
            timestamp_us,
        }
    }

    pub fn range_bearing(rho: f64, phi: f64, rho_dot: f64, timestamp_us: i64) -> Self {
        Self {
            reading: Reading::RangeBearing(Vector3::new(rho, phi, rho_dot)),
            timestamp_us,
        }
    }

    pub fn modality(&self) -> Modality {
        match self.reading {
            Reading::Linear(_) => Modality::Linear,
            Reading::RangeBearing(_) => Modality::RangeBearing,
        }
    }

    /// Cartesian position implied by the raw reading
    pub fn position(&self) -> Vector2<f64> {
        match self.reading {
            Reading::Linear(z) => z,
            Reading::RangeBearing(z) => Vector2::new(z[0] * z[1].cos(), z[0] * z[1].sin()),
        }
    }
}

/// A measurement together with the ground truth recorded alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub measurement: Measurement,
    /// [px, py, vx, vy] when the source provides it
    pub ground_truth: Option<Vector4<f64>>,
}
