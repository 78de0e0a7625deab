//! Frequency-domain compact-binary waveforms.
//!
//! Only the plus polarization of a face-on, non-precessing binary is
//! produced; that is all the lensing sweep needs, since every recorded
//! quantity is a ratio against the same unlensed signal.

pub mod phenom;
pub mod taylorf2;

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constants::{MPC_SI, MTSUN_SI};
use crate::series::FrequencySeries;
use crate::LensError;

pub use phenom::PhenomImr;
pub use taylorf2::TaylorF2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approximant {
    /// Post-Newtonian stationary-phase inspiral, terminated at the ISCO.
    TaylorF2,
    /// TaylorF2 inspiral joined to a phenomenological merger-ringdown.
    #[default]
    #[serde(rename = "PhenomIMR")]
    PhenomImr,
}

impl Approximant {
    pub fn name(self) -> &'static str {
        match self {
            Self::TaylorF2 => "TaylorF2",
            Self::PhenomImr => "PhenomIMR",
        }
    }
}

impl fmt::Display for Approximant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detector-frame binary parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformParams {
    pub approximant: Approximant,
    /// Component masses [M_sun]
    pub mass1: f64,
    pub mass2: f64,
    /// Dimensionless spins along the orbital angular momentum
    pub spin1z: f64,
    pub spin2z: f64,
    /// Luminosity distance [Mpc]
    pub distance_mpc: f64,
}

impl WaveformParams {
    pub fn validate(&self) -> Result<(), LensError> {
        if !(self.mass1.is_finite() && self.mass1 > 0.0 && self.mass2.is_finite() && self.mass2 > 0.0)
        {
            return Err(LensError::InvalidWaveform(
                "component masses must be finite and positive".to_string(),
            ));
        }

        if !(self.spin1z.abs() < 1.0 && self.spin2z.abs() < 1.0) {
            return Err(LensError::InvalidWaveform(
                "aligned spins must lie strictly inside (-1, 1)".to_string(),
            ));
        }

        if !(self.distance_mpc.is_finite() && self.distance_mpc > 0.0) {
            return Err(LensError::InvalidWaveform(
                "distance must be finite and positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn total_mass(&self) -> f64 {
        self.mass1 + self.mass2
    }

    /// Symmetric mass ratio `m1 m2 / M^2`.
    pub fn eta(&self) -> f64 {
        self.mass1 * self.mass2 / (self.total_mass() * self.total_mass())
    }

    pub fn chirp_mass(&self) -> f64 {
        self.eta().powf(0.6) * self.total_mass()
    }

    /// Total mass as a time, `G M / c^3` [s].
    pub fn total_mass_seconds(&self) -> f64 {
        self.total_mass() * MTSUN_SI
    }

    /// Mass-weighted aligned spin.
    pub fn chi_eff(&self) -> f64 {
        (self.mass1 * self.spin1z + self.mass2 * self.spin2z) / self.total_mass()
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_mpc * MPC_SI
    }
}

/// A closed-form frequency-domain model `h(f) = A(f) exp(-i Psi(f))`.
pub trait FrequencyModel {
    /// Highest frequency the model is defined at [Hz].
    fn cutoff_frequency(&self) -> f64;
    fn amplitude(&self, f: f64) -> f64;
    fn phase(&self, f: f64) -> f64;

    fn strain(&self, f: f64) -> Complex64 {
        Complex64::from_polar(self.amplitude(f), -self.phase(f))
    }
}

pub fn build_model(params: &WaveformParams) -> Result<Box<dyn FrequencyModel + Send + Sync>, LensError> {
    params.validate()?;

    let model: Box<dyn FrequencyModel + Send + Sync> = match params.approximant {
        Approximant::TaylorF2 => Box::new(TaylorF2::new(params)),
        Approximant::PhenomImr => Box::new(PhenomImr::new(params)),
    };
    Ok(model)
}

/// Samples the model on `k * delta_f` from 0 Hz to its cutoff.
///
/// The series holds a power-of-two number of bins plus one; bins below
/// `f_lower` and above the cutoff are zero.
pub fn generate_fd_waveform(
    params: &WaveformParams,
    delta_f: f64,
    f_lower: f64,
) -> Result<FrequencySeries, LensError> {
    if !(delta_f.is_finite() && delta_f > 0.0) {
        return Err(LensError::InvalidWaveform(format!(
            "delta_f must be finite and positive, got {delta_f}"
        )));
    }

    if !(f_lower.is_finite() && f_lower > 0.0) {
        return Err(LensError::InvalidWaveform(format!(
            "f_lower must be finite and positive, got {f_lower}"
        )));
    }

    let model = build_model(params)?;
    let f_cut = model.cutoff_frequency();
    if f_cut <= f_lower {
        return Err(LensError::InvalidWaveform(format!(
            "{} cutoff {f_cut:.3} Hz is below f_lower {f_lower:.3} Hz",
            params.approximant
        )));
    }

    let n_bins = ((f_cut / delta_f).ceil() as usize).next_power_of_two();
    let data = (0..=n_bins)
        .map(|idx| {
            let f = idx as f64 * delta_f;
            if f < f_lower || f > f_cut {
                Complex64::new(0.0, 0.0)
            } else {
                model.strain(f)
            }
        })
        .collect();

    FrequencySeries::new(data, delta_f)
}
