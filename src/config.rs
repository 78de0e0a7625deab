use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::lens::LensSettings;
use crate::psd::NoiseCurve;
use crate::waveform::{Approximant, WaveformParams};
use crate::LensError;

/// Parameters of one lensing sweep.
///
/// Every field has a default reproducing the Einstein Telescope
/// 10+10 solar-mass experiment, so a partial JSON file only needs to name the
/// values it changes.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Signal duration [s]; the frequency resolution is `1 / tlen`
    #[serde_as(as = "DefaultOnNull")]
    pub tlen: f64,
    /// Low-frequency cutoff of the waveform and of every inner product [Hz]
    #[serde_as(as = "DefaultOnNull")]
    pub f_low: f64,
    /// Nyquist frequency [Hz]
    #[serde_as(as = "DefaultOnNull")]
    pub nyquist: usize,
    /// Lens mass grid bounds [M_sun], log-spaced
    #[serde_as(as = "DefaultOnNull")]
    pub ml_min: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub ml_max: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub num_ml: usize,
    /// Source offset grid bounds [Einstein radii], log-spaced
    #[serde_as(as = "DefaultOnNull")]
    pub y_min: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub y_max: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub num_y: usize,
    /// Cosmological redshift applied to lens and source masses
    #[serde_as(as = "DefaultOnNull")]
    pub redshift: f64,
    /// Source-frame component masses [M_sun]
    #[serde_as(as = "DefaultOnNull")]
    pub mass1: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub mass2: f64,
    /// Dimensionless aligned spins
    #[serde_as(as = "DefaultOnNull")]
    pub spin1z: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub spin2z: f64,
    /// Luminosity distance [Mpc]; cancels in every recorded ratio
    #[serde_as(as = "DefaultOnNull")]
    pub distance_mpc: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub approximant: Approximant,
    #[serde_as(as = "DefaultOnNull")]
    pub noise_curve: NoiseCurve,
    /// Noise curve is zeroed below this frequency [Hz]
    #[serde_as(as = "DefaultOnNull")]
    pub psd_low_freq_cutoff: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub lens: LensSettings,
    #[serde_as(as = "DefaultOnNull")]
    pub subsample_interpolation: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub write_csv: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub output_root: PathBuf,
    /// Worker threads for the sweep; `None` uses the rayon global pool
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            tlen: 16.0,
            f_low: 15.0,
            nyquist: 2048,
            ml_min: 1.0e-2,
            ml_max: 1.0e4,
            num_ml: 1000,
            y_min: 1.0e-2,
            y_max: 10.0,
            num_y: 1000,
            redshift: 0.0,
            mass1: 10.0,
            mass2: 10.0,
            spin1z: 0.0,
            spin2z: 0.0,
            distance_mpc: 100_000.0,
            approximant: Approximant::default(),
            noise_curve: NoiseCurve::default(),
            psd_low_freq_cutoff: 10.0,
            lens: LensSettings::default(),
            subsample_interpolation: false,
            write_csv: true,
            output_root: PathBuf::from("output-gw-lens-mismatch"),
            threads: None,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), LensError> {
        if !(self.tlen.is_finite() && self.tlen > 0.0) {
            return Err(invalid("tlen must be finite and greater than zero"));
        }

        if self.nyquist == 0 {
            return Err(invalid("nyquist must be greater than zero"));
        }

        let bins = self.nyquist as f64 * self.tlen;
        if (bins - bins.round()).abs() > 1e-9 {
            return Err(invalid("nyquist * tlen must be an integer number of bins"));
        }

        if !(self.f_low.is_finite() && self.f_low > 0.0) {
            return Err(invalid("f_low must be finite and greater than zero"));
        }

        if self.f_low >= self.nyquist as f64 {
            return Err(invalid("f_low must be below the nyquist frequency"));
        }

        if !self.psd_low_freq_cutoff.is_finite() || self.psd_low_freq_cutoff < 0.0 {
            return Err(invalid("psd_low_freq_cutoff must be finite and non-negative"));
        }

        validate_log_grid("lens mass", self.ml_min, self.ml_max, self.num_ml)?;
        validate_log_grid("source offset", self.y_min, self.y_max, self.num_y)?;

        if !self.redshift.is_finite() || self.redshift <= -1.0 {
            return Err(invalid("redshift must be finite and greater than -1"));
        }

        if !(self.distance_mpc.is_finite() && self.distance_mpc > 0.0) {
            return Err(invalid("distance_mpc must be finite and greater than zero"));
        }

        if self.threads == Some(0) {
            return Err(invalid("threads must be greater than zero when set"));
        }

        self.lens.validate()?;
        self.waveform_params().validate()?;

        Ok(())
    }

    pub fn delta_f(&self) -> f64 {
        1.0 / self.tlen
    }

    /// Number of one-sided bins from 0 Hz to the nyquist frequency inclusive.
    pub fn full_len(&self) -> usize {
        (self.nyquist as f64 * self.tlen).round() as usize + 1
    }

    /// Redshift scaling `(1 + z)` applied to every mass.
    pub fn mass_scale(&self) -> f64 {
        1.0 + self.redshift
    }

    /// Redshifted lens masses [M_sun].
    pub fn ml_grid(&self) -> Vec<f64> {
        let scale = self.mass_scale();
        log_grid(self.ml_min, self.ml_max, self.num_ml)
            .into_iter()
            .map(|ml| ml * scale)
            .collect()
    }

    pub fn y_grid(&self) -> Vec<f64> {
        log_grid(self.y_min, self.y_max, self.num_y)
    }

    /// Detector-frame waveform parameters.
    pub fn waveform_params(&self) -> WaveformParams {
        let scale = self.mass_scale();
        WaveformParams {
            approximant: self.approximant,
            mass1: self.mass1 * scale,
            mass2: self.mass2 * scale,
            spin1z: self.spin1z,
            spin2z: self.spin2z,
            distance_mpc: self.distance_mpc,
        }
    }

    /// Source-frame `(m1, m2, s1z, s2z)` as stored in the result metadata.
    pub fn wf_params_tuple(&self) -> [f64; 4] {
        [self.mass1, self.mass2, self.spin1z, self.spin2z]
    }
}

fn invalid(message: &str) -> LensError {
    LensError::InvalidConfig(message.to_string())
}

fn validate_log_grid(name: &str, min: f64, max: f64, num: usize) -> Result<(), LensError> {
    if num == 0 {
        return Err(LensError::InvalidConfig(format!(
            "{name} grid must contain at least one point"
        )));
    }

    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0) {
        return Err(LensError::InvalidConfig(format!(
            "{name} grid bounds must be finite and positive"
        )));
    }

    if max < min {
        return Err(LensError::InvalidConfig(format!(
            "{name} grid maximum must be greater than or equal to its minimum"
        )));
    }

    Ok(())
}

/// `num` points evenly spaced in log10 between `min` and `max` inclusive.
pub fn log_grid(min: f64, max: f64, num: usize) -> Vec<f64> {
    if num == 1 {
        return vec![min];
    }

    let start = min.log10();
    let span = max.log10() - start;
    let denom = (num - 1) as f64;

    (0..num)
        .map(|idx| 10f64.powf(start + span * idx as f64 / denom))
        .collect()
}
