// UKF tracker - command-line driver
// Replays a lidar/radar measurement file (or a simulated scenario) through
// the unscented Kalman filter and reports accuracy and consistency.

use std::fs::File;
use std::io::BufReader;

use clap::Parser;
use tracing::{info, warn};

use ukf_tracker::config::{Config, OutputFormat};
use ukf_tracker::input::read_measurements;
use ukf_tracker::kalman::UnscentedKalmanFilter;
use ukf_tracker::measurement::Modality;
use ukf_tracker::output::{JsonOutput, OutputHandler, TsvOutput};
use ukf_tracker::pipeline::replay;
use ukf_tracker::simulate::{self, Scenario};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_logging(config.verbose);

    let filter_config = config.filter_config()?;
    info!(
        "Sensors: lidar {}, radar {}",
        if filter_config.enable_linear_sensor { "on" } else { "off" },
        if filter_config.enable_nonlinear_sensor { "on" } else { "off" }
    );

    let records = match &config.input {
        Some(path) if !config.simulate => {
            info!("Reading measurements from {}", path.display());
            let file = File::open(path)?;
            read_measurements(BufReader::new(file))?
        }
        _ => {
            let scenario = Scenario {
                steps: config.steps,
                interval_us: config.interval_us,
                seed: config.seed,
                ..Scenario::default()
            };
            info!(
                "Simulating {} measurements every {} us (seed {})",
                scenario.steps, scenario.interval_us, scenario.seed
            );
            simulate::generate(&scenario, &filter_config)
        }
    };
    info!("Loaded {} measurements", records.len());

    let mut output: Option<Box<dyn OutputHandler>> = match &config.output {
        Some(path) => {
            info!("Writing estimates to {}", path.display());
            let handler: Box<dyn OutputHandler> = match config.format {
                OutputFormat::Tsv => Box::new(TsvOutput::create(path)?),
                OutputFormat::Json => Box::new(JsonOutput::create(path)?),
            };
            Some(handler)
        }
        None => None,
    };

    let mut filter = UnscentedKalmanFilter::new(filter_config)?;
    let handler = output.as_deref_mut().map(|h| h as &mut dyn OutputHandler);
    let summary = replay(&mut filter, &records, handler);

    info!(
        "Processed {} measurements ({} skipped, {} failures)",
        summary.processed, summary.skipped, summary.failures
    );

    match summary.rmse() {
        Ok(rmse) => info!(
            "RMSE px {:.4} py {:.4} vx {:.4} vy {:.4}",
            rmse[0], rmse[1], rmse[2], rmse[3]
        ),
        Err(e) => warn!("RMSE not available: {}", e),
    }

    for modality in [Modality::Linear, Modality::RangeBearing] {
        if let (Some(mean), Some(above)) = (
            summary.nis.mean(modality),
            summary.nis.fraction_above_95(modality),
        ) {
            info!(
                "NIS {}: {} samples, mean {:.3}, {:.1}% above 95% threshold",
                modality.tag(),
                summary.nis.count(modality),
                mean,
                above * 100.0
            );
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_span_events(if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE });

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
