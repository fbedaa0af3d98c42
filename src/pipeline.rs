// Measurement replay
//
// Feeds a recorded or simulated measurement sequence through the filter,
// forwarding estimates to an output handler and collecting the statistics
// reported at the end of a run.

use nalgebra::Vector4;
use tracing::{debug, error, warn};

use crate::error::{EstimatorError, MetricError};
use crate::kalman::{ProcessOutcome, UnscentedKalmanFilter};
use crate::measurement::MeasurementRecord;
use crate::metrics::{calculate_rmse, state_to_cartesian, NisSummary};
use crate::output::{EstimateRecord, OutputHandler};

/// Everything collected while replaying a measurement sequence
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Cartesian estimates for records that carried ground truth
    pub estimates: Vec<Vector4<f64>>,
    /// Ground truth paired with `estimates`
    pub ground_truth: Vec<Vector4<f64>>,
    pub nis: NisSummary,
    pub processed: usize,
    pub skipped: usize,
    /// Measurements that could not be fused
    pub failures: usize,
}

impl RunSummary {
    pub fn rmse(&self) -> Result<Vector4<f64>, MetricError> {
        calculate_rmse(&self.estimates, &self.ground_truth)
    }
}

/// Run every record through the filter in order.
///
/// A singular innovation keeps the prediction and moves on. A covariance that
/// is no longer positive-definite resets the filter, so the next record
/// re-initializes the track.
pub fn replay(
    filter: &mut UnscentedKalmanFilter,
    records: &[MeasurementRecord],
    mut output: Option<&mut dyn OutputHandler>,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for record in records {
        let measurement = &record.measurement;
        let nis = match filter.process_measurement(measurement) {
            Ok(ProcessOutcome::Skipped) => {
                summary.skipped += 1;
                continue;
            }
            Ok(ProcessOutcome::Initialized) => None,
            Ok(ProcessOutcome::Updated { nis }) => {
                summary.nis.record(measurement.modality(), nis);
                Some(nis)
            }
            Err(e @ EstimatorError::SingularInnovation { .. }) => {
                warn!(
                    "{} measurement at {} not fused: {}",
                    measurement.modality().tag(),
                    measurement.timestamp_us,
                    e
                );
                summary.failures += 1;
                continue;
            }
            Err(e) => {
                error!(
                    "{} measurement at {} failed: {}; resetting filter",
                    measurement.modality().tag(),
                    measurement.timestamp_us,
                    e
                );
                summary.failures += 1;
                filter.reset();
                continue;
            }
        };
        summary.processed += 1;

        if let Some(handler) = output.as_deref_mut() {
            handler.handle_estimate(&EstimateRecord::new(record, filter.mean(), nis));
        }

        if let Some(truth) = record.ground_truth {
            summary.estimates.push(state_to_cartesian(filter.mean()));
            summary.ground_truth.push(truth);
        }
    }

    if let Some(handler) = output {
        handler.finish();
    }

    debug!(
        "Replay finished: {} processed, {} skipped, {} failures",
        summary.processed, summary.skipped, summary.failures
    );
    summary
}
