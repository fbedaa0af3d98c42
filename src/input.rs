// Measurement file parsing
//
// One measurement per line, whitespace separated:
//   L  px  py          timestamp  gt_px gt_py gt_vx gt_vy [gt_yaw gt_yawrate]
//   R  rho phi rho_dot timestamp  gt_px gt_py gt_vx gt_vy [gt_yaw gt_yawrate]
// Blank lines and lines starting with '#' are ignored.

use std::io::BufRead;

use nalgebra::Vector4;

use crate::error::ParseError;
use crate::measurement::{Measurement, MeasurementRecord};

/// Parse every measurement line from a reader
pub fn read_measurements<R: BufRead>(reader: R) -> Result<Vec<MeasurementRecord>, ParseError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(record) = parse_line(&line, index + 1)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse a single line. Returns `None` for blank and comment lines.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<MeasurementRecord>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let tag = fields[0];
    let values = &fields[1..];

    // Number of observation values before the timestamp
    let n_obs = match tag {
        "L" => 2,
        "R" => 3,
        _ => {
            return Err(ParseError::UnknownSensor {
                line: line_number,
                tag: tag.to_string(),
            })
        }
    };

    if values.len() < n_obs + 1 {
        return Err(ParseError::MissingFields {
            line: line_number,
            expected: n_obs + 2,
            found: fields.len(),
        });
    }

    let obs = values[..n_obs]
        .iter()
        .map(|v| parse_f64(v, line_number))
        .collect::<Result<Vec<f64>, _>>()?;
    let timestamp_us = values[n_obs]
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidNumber {
            line: line_number,
            value: values[n_obs].to_string(),
        })?;

    let measurement = if n_obs == 2 {
        Measurement::linear(obs[0], obs[1], timestamp_us)
    } else {
        Measurement::range_bearing(obs[0], obs[1], obs[2], timestamp_us)
    };

    // Ground truth is optional but must be complete when present
    let rest = &values[n_obs + 1..];
    let ground_truth = match rest.len() {
        0 => None,
        n if n >= 4 => {
            let gt = rest[..4]
                .iter()
                .map(|v| parse_f64(v, line_number))
                .collect::<Result<Vec<f64>, _>>()?;
            Some(Vector4::new(gt[0], gt[1], gt[2], gt[3]))
        }
        _ => {
            return Err(ParseError::MissingFields {
                line: line_number,
                expected: n_obs + 6,
                found: fields.len(),
            })
        }
    };

    Ok(Some(MeasurementRecord {
        measurement,
        ground_truth,
    }))
}

fn parse_f64(value: &str, line_number: usize) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        line: line_number,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{Modality, Reading};

    #[test]
    fn test_parse_lidar_line() {
        let record = parse_line(
            "L\t3.122427e-01\t5.803398e-01\t1477010443000000\t6.000000e-01\t6.000000e-01\t5.199937e+00\t0\t0\t6.911322e-03",
            1,
        )
        .unwrap()
        .unwrap();

        assert_eq!(record.measurement.modality(), Modality::Linear);
        assert_eq!(record.measurement.timestamp_us, 1477010443000000);
        match record.measurement.reading {
            Reading::Linear(z) => {
                assert!((z[0] - 0.3122427).abs() < 1e-12);
                assert!((z[1] - 0.5803398).abs() < 1e-12);
            }
            other => panic!("unexpected reading {:?}", other),
        }
        let gt = record.ground_truth.unwrap();
        assert!((gt[2] - 5.199937).abs() < 1e-12);
    }

    #[test]
    fn test_parse_radar_line_without_ground_truth() {
        let record = parse_line("R 1.014892 0.554329 4.892807 1477010443050000", 2)
            .unwrap()
            .unwrap();
        assert_eq!(record.measurement.modality(), Modality::RangeBearing);
        assert!(record.ground_truth.is_none());
    }

    #[test]
    fn test_skip_blank_and_comment_lines() {
        assert!(parse_line("", 1).unwrap().is_none());
        assert!(parse_line("   ", 1).unwrap().is_none());
        assert!(parse_line("# header", 1).unwrap().is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_line("X 1 2 3", 7),
            Err(ParseError::UnknownSensor { line: 7, .. })
        ));
        assert!(matches!(
            parse_line("R 1 2 3", 3),
            Err(ParseError::MissingFields { line: 3, .. })
        ));
        assert!(matches!(
            parse_line("L 1 abc 100", 4),
            Err(ParseError::InvalidNumber { line: 4, .. })
        ));
        assert!(matches!(
            parse_line("L 1 2 100 0.5 0.5", 5),
            Err(ParseError::MissingFields { line: 5, .. })
        ));
    }

    #[test]
    fn test_read_measurements() {
        let text = "L 1 2 0 1 2 0 0\n\n# radar next\nR 5 0 0 50000 5 0 0 0\n";
        let records = read_measurements(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].measurement.timestamp_us, 50000);
    }
}
