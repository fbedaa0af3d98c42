use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// UKF tracker command-line configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Measurement file (L/R lines). Required unless --simulate is given.
    #[arg(value_name = "INPUT", required_unless_present = "simulate")]
    pub input: Option<PathBuf>,

    /// Write one estimate per processed measurement to this file.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for --output.
    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub format: OutputFormat,

    /// JSON file with filter noise parameters and prior (missing keys use defaults).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ignore lidar (linear position) measurements.
    #[arg(long, default_value_t = false)]
    pub disable_linear: bool,

    /// Ignore radar (range/bearing/range-rate) measurements.
    #[arg(long, default_value_t = false)]
    pub disable_nonlinear: bool,

    /// Generate a synthetic CTRV scenario instead of reading INPUT.
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// Number of simulated measurements.
    #[arg(long, default_value_t = 500)]
    pub steps: usize,

    /// Seed for the simulation noise generator.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Time between simulated measurements in microseconds.
    #[arg(long, default_value_t = 50_000)]
    pub interval_us: i64,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tab-separated columns
    Tsv,
    /// One JSON object per line
    Json,
}

impl Config {
    /// Build the filter configuration: defaults, then the JSON file, then CLI switches.
    pub fn filter_config(&self) -> Result<FilterConfig, ConfigError> {
        let mut filter = match &self.config {
            Some(path) => FilterConfig::from_json_file(path)?,
            None => FilterConfig::default(),
        };
        if self.disable_linear {
            filter.enable_linear_sensor = false;
        }
        if self.disable_nonlinear {
            filter.enable_nonlinear_sensor = false;
        }
        filter.validate()?;
        Ok(filter)
    }
}

/// Estimator configuration, immutable for the lifetime of a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Process lidar measurements (ignored entirely when false)
    pub enable_linear_sensor: bool,
    /// Process radar measurements (ignored entirely when false)
    pub enable_nonlinear_sensor: bool,

    /// Process noise std-dev of longitudinal acceleration (m/s^2)
    pub accel_noise_std: f64,
    /// Process noise std-dev of yaw acceleration (rad/s^2)
    pub yaw_accel_noise_std: f64,

    /// Lidar x noise std-dev (m)
    pub linear_pos_x_std: f64,
    /// Lidar y noise std-dev (m)
    pub linear_pos_y_std: f64,

    /// Radar range noise std-dev (m)
    pub range_std: f64,
    /// Radar bearing noise std-dev (rad)
    pub bearing_std: f64,
    /// Radar range-rate noise std-dev (m/s)
    pub range_rate_std: f64,

    /// State guess used on initialization before observed terms are overwritten
    pub prior_mean: [f64; N_X],
    /// Diagonal of the initial covariance
    pub prior_variance: [f64; N_X],
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_linear_sensor: true,
            enable_nonlinear_sensor: true,
            accel_noise_std: DEFAULT_STD_A,
            yaw_accel_noise_std: DEFAULT_STD_YAWDD,
            linear_pos_x_std: DEFAULT_STD_LASER_PX,
            linear_pos_y_std: DEFAULT_STD_LASER_PY,
            range_std: DEFAULT_STD_RADAR_R,
            bearing_std: DEFAULT_STD_RADAR_PHI,
            range_rate_std: DEFAULT_STD_RADAR_RD,
            prior_mean: DEFAULT_PRIOR_MEAN,
            prior_variance: DEFAULT_PRIOR_VARIANCE,
        }
    }
}

impl FilterConfig {
    /// Load from a JSON file. Keys not present keep their default values.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: FilterConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every noise term is usable and the prior is positive definite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let std_devs = [
            ("accel_noise_std", self.accel_noise_std),
            ("yaw_accel_noise_std", self.yaw_accel_noise_std),
            ("linear_pos_x_std", self.linear_pos_x_std),
            ("linear_pos_y_std", self.linear_pos_y_std),
            ("range_std", self.range_std),
            ("bearing_std", self.bearing_std),
            ("range_rate_std", self.range_rate_std),
        ];
        for (name, value) in std_devs {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidStdDev { name, value });
            }
        }

        for (index, &value) in self.prior_mean.iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::InvalidPriorMean { index, value });
            }
        }
        for (index, &value) in self.prior_variance.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidPriorVariance { index, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.enable_linear_sensor);
        assert!(config.enable_nonlinear_sensor);
        assert_eq!(config.prior_mean, [1.0, 1.0, 1.0, 1.0, 0.1]);
    }

    #[test]
    fn test_negative_std_rejected() {
        let config = FilterConfig {
            bearing_std: -0.1,
            ..FilterConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidStdDev { name, .. }) => assert_eq!(name, "bearing_std"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_zero_prior_variance_rejected() {
        let mut config = FilterConfig::default();
        config.prior_variance[2] = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPriorVariance { index: 2, .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"accel_noise_std": 3.0, "enable_nonlinear_sensor": false}"#)
                .unwrap();
        assert_eq!(config.accel_noise_std, 3.0);
        assert!(!config.enable_nonlinear_sensor);
        assert_eq!(config.range_std, DEFAULT_STD_RADAR_R);
    }

    #[test]
    fn test_cli_switches_disable_sensors() {
        let cli = Config::parse_from(["ukf-tracker", "--simulate", "--disable-linear"]);
        let filter = cli.filter_config().unwrap();
        assert!(!filter.enable_linear_sensor);
        assert!(filter.enable_nonlinear_sensor);
    }

    #[test]
    fn test_cli_requires_input_without_simulate() {
        assert!(Config::try_parse_from(["ukf-tracker"]).is_err());
        let cli = Config::parse_from(["ukf-tracker", "data.txt", "--format", "json"]);
        assert_eq!(cli.input, Some(PathBuf::from("data.txt")));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
