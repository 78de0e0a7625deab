//! gw-lens-mismatch
//!
//! Point-mass gravitational lensing of compact-binary gravitational-wave
//! signals. A single unlensed frequency-domain waveform is multiplied by the
//! lensing amplification factor over a grid of lens masses and source
//! offsets; every grid cell records the SNR ratio and the mismatch against
//! the unlensed signal for a chosen detector noise curve.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod filter;
pub mod lens;
pub mod output;
pub mod psd;
pub mod series;
pub mod sweep;
pub mod waveform;

use std::path::PathBuf;

use thiserror::Error;

pub use config::SweepConfig;
pub use filter::Matcher;
pub use lens::{LensModel, PointMassLens};
pub use output::create_timestamped_output_dir;
pub use psd::NoiseCurve;
pub use series::FrequencySeries;
pub use sweep::{run_sweep, run_sweep_into_dir, GridCell, SweepResult};
pub use waveform::{Approximant, WaveformParams};

#[derive(Debug, Error)]
pub enum LensError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid waveform parameters: {0}")]
    InvalidWaveform(String),
    #[error("noise curve {path}: line {line}: {reason}")]
    NoiseCurveParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("degenerate normalization: {0}")]
    ZeroNorm(&'static str),
}

/// Validates `config`, then runs the sweep into a fresh timestamped
/// directory under `output_root`.
pub fn run_default_sweep(config: &SweepConfig) -> Result<SweepResult, LensError> {
    config.validate()?;
    let output_dir = create_timestamped_output_dir(&config.output_root)?;
    sweep::run_sweep_into_dir(config, &output_dir)
}
