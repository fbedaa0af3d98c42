pub mod config;
pub mod constants;
pub mod error;
pub mod input;
pub mod kalman;
pub mod measurement;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod simulate;
