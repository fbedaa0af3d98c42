use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::error;

use crate::kalman::StateVector;
use crate::measurement::{MeasurementRecord, Modality};

/// One filter estimate together with the input that produced it
#[derive(Debug, Clone, Serialize)]
pub struct EstimateRecord {
    pub timestamp_us: i64,
    pub sensor: Modality,
    /// [px, py, v, yaw, yaw_rate]
    pub state: [f64; 5],
    /// NIS of this update; absent on the initializing measurement
    pub nis: Option<f64>,
    /// Measured position in cartesian coordinates
    pub measured: [f64; 2],
    /// [px, py, vx, vy] when the input carried ground truth
    pub ground_truth: Option<[f64; 4]>,
}

impl EstimateRecord {
    pub fn new(record: &MeasurementRecord, state: &StateVector, nis: Option<f64>) -> Self {
        let measured = record.measurement.position();
        EstimateRecord {
            timestamp_us: record.measurement.timestamp_us,
            sensor: record.measurement.modality(),
            state: [state[0], state[1], state[2], state[3], state[4]],
            nis,
            measured: [measured[0], measured[1]],
            ground_truth: record.ground_truth.map(|gt| [gt[0], gt[1], gt[2], gt[3]]),
        }
    }
}

/// Trait for output handlers
pub trait OutputHandler {
    /// Handle a new filter estimate
    fn handle_estimate(&mut self, estimate: &EstimateRecord);

    /// Flush buffered output
    fn finish(&mut self) {}
}

/// Tab-separated output, one row per estimate with a header line
pub struct TsvOutput<W: Write> {
    writer: W,
}

impl TsvOutput<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        TsvOutput::new(BufWriter::new(file))
    }
}

impl<W: Write> TsvOutput<W> {
    pub fn new(mut writer: W) -> std::io::Result<Self> {
        writeln!(
            writer,
            "timestamp\tsensor\tpx\tpy\tv\tyaw\tyaw_rate\tnis\t\
             meas_px\tmeas_py\tgt_px\tgt_py\tgt_vx\tgt_vy"
        )?;
        Ok(TsvOutput { writer })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn format_row(estimate: &EstimateRecord) -> String {
        let s = &estimate.state;
        let nis = estimate.nis.map(|n| format!("{:.6}", n)).unwrap_or_default();
        let gt = match estimate.ground_truth {
            Some(gt) => format!("{:.6}\t{:.6}\t{:.6}\t{:.6}", gt[0], gt[1], gt[2], gt[3]),
            None => "\t\t\t".to_string(),
        };
        format!(
            "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}\t{:.6}\t{:.6}\t{}",
            estimate.timestamp_us,
            estimate.sensor.tag(),
            s[0],
            s[1],
            s[2],
            s[3],
            s[4],
            nis,
            estimate.measured[0],
            estimate.measured[1],
            gt
        )
    }
}

impl<W: Write> OutputHandler for TsvOutput<W> {
    fn handle_estimate(&mut self, estimate: &EstimateRecord) {
        if let Err(e) = writeln!(self.writer, "{}", Self::format_row(estimate)) {
            error!("Failed to write TSV row: {}", e);
        }
    }

    fn finish(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("Failed to flush TSV output: {}", e);
        }
    }
}

/// JSON lines output
pub struct JsonOutput<W: Write> {
    writer: W,
}

impl JsonOutput<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(JsonOutput::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonOutput<W> {
    pub fn new(writer: W) -> Self {
        JsonOutput { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputHandler for JsonOutput<W> {
    fn handle_estimate(&mut self, estimate: &EstimateRecord) {
        let line = match serde_json::to_string(estimate) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode estimate: {}", e);
                return;
            }
        };
        if let Err(e) = writeln!(self.writer, "{}", line) {
            error!("Failed to write JSON line: {}", e);
        }
    }

    fn finish(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("Failed to flush JSON output: {}", e);
        }
    }
}
