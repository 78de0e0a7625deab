//! Inspiral-merger-ringdown model.
//!
//! Amplitude: PN-corrected inspiral, a `f^(-2/3)` merger power law and a
//! Lorentzian ringdown, glued continuously by the weights `w_m` and `w_r`.
//! Phase: TaylorF2 up to the merger frequency, then continued with matching
//! value and slope plus the arctangent phase of the dominant quasi-normal
//! mode.

use std::f64::consts::PI;

use crate::waveform::taylorf2::{newtonian_amplitude_prefactor, PnPhasing};
use crate::waveform::{FrequencyModel, WaveformParams};

/// Geometric-unit frequency `M f` where the model is cut off.
pub const MF_CUT: f64 = 0.2;

/// Final black-hole state and dominant (l = m = 2, n = 0) ringdown mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemnantProperties {
    /// Final mass over initial total mass
    pub mass_fraction: f64,
    /// Dimensionless final spin
    pub spin: f64,
    /// Ringdown frequency [Hz]
    pub f_ring: f64,
    /// Damping frequency, half the Lorentzian width [Hz]
    pub f_damp: f64,
}

impl RemnantProperties {
    pub fn new(params: &WaveformParams) -> Self {
        let eta = params.eta();
        let mass_fraction = final_mass_fraction(eta);
        let spin = final_spin(params);
        let m_final_sec = mass_fraction * params.total_mass_seconds();

        // Berti, Cardoso & Will fits for the fundamental l = m = 2 mode.
        let one_minus = 1.0 - spin;
        let f_ring = (1.5251 - 1.1568 * one_minus.powf(0.1292)) / (2.0 * PI * m_final_sec);
        let quality = 0.7 + 1.4187 * one_minus.powf(-0.4990);
        let f_damp = f_ring / (2.0 * quality);

        Self {
            mass_fraction,
            spin,
            f_ring,
            f_damp,
        }
    }
}

/// Non-spinning radiated-energy fit.
pub fn final_mass_fraction(eta: f64) -> f64 {
    1.0 + ((8.0_f64 / 9.0).sqrt() - 1.0) * eta - 0.4333 * eta * eta - 0.4392 * eta * eta * eta
}

/// Aligned-spin final spin fit (Rezzolla et al.).
pub fn final_spin(params: &WaveformParams) -> f64 {
    let (heavy, light, chi_heavy, chi_light) = if params.mass1 >= params.mass2 {
        (params.mass1, params.mass2, params.spin1z, params.spin2z)
    } else {
        (params.mass2, params.mass1, params.spin2z, params.spin1z)
    };
    let q = light / heavy;
    let nu = params.eta();
    let a_tilde = (chi_heavy + chi_light * q * q) / (1.0 + q * q);

    let s4 = -0.1229;
    let s5 = 0.4537;
    let t0 = -2.8904;
    let t2 = -3.5171;
    let t3 = 2.5763;

    let spin = a_tilde
        + s4 * a_tilde * a_tilde * nu
        + s5 * a_tilde * nu * nu
        + t0 * a_tilde * nu
        + 2.0 * 3f64.sqrt() * nu
        + t2 * nu * nu
        + t3 * nu * nu * nu;
    spin.clamp(-0.998, 0.998)
}

#[derive(Debug, Clone)]
pub struct PhenomImr {
    phasing: PnPhasing,
    amp0: f64,
    remnant: RemnantProperties,
    f_merger: f64,
    f_cut: f64,
    alpha2: f64,
    alpha3: f64,
    eps1: f64,
    eps2: f64,
    w_merger: f64,
    w_ring: f64,
    /// Lorentzian full width, `2 f_damp` [Hz]
    sigma: f64,
    phase_at_merger: f64,
    slope_at_merger: f64,
}

impl PhenomImr {
    pub fn new(params: &WaveformParams) -> Self {
        let phasing = PnPhasing::new(params);
        let m_sec = phasing.m_sec;
        let eta = params.eta();
        let chi = params.chi_eff();
        let remnant = RemnantProperties::new(params);

        let alpha2 = -323.0 / 224.0 + 451.0 / 168.0 * eta;
        let alpha3 = (27.0 / 8.0 - 11.0 / 6.0 * eta) * chi;
        let eps1 = 1.4547 * chi - 1.8897;
        let eps2 = -1.8153 * chi + 1.6557;

        let one_minus = 1.0 - chi;
        let f_merger_fit =
            (1.0 - 4.455 * one_minus.powf(0.217) + 3.521 * one_minus.powf(0.26)) / (PI * m_sec);
        let f_merger = f_merger_fit.min(0.9 * remnant.f_ring);
        let f_ring = remnant.f_ring;
        let sigma = 2.0 * remnant.f_damp;

        let v1 = phasing.v(f_merger);
        let v2 = phasing.v(f_ring);
        let w_merger = (1.0 + alpha2 * v1 * v1 + alpha3 * v1.powi(3)) / (1.0 + eps1 * v1 + eps2 * v1 * v1);
        let w_ring = w_merger
            * (PI * sigma / 2.0)
            * (f_ring / f_merger).powf(-2.0 / 3.0)
            * (1.0 + eps1 * v2 + eps2 * v2 * v2);

        let mut model = Self {
            phase_at_merger: phasing.phase(f_merger),
            slope_at_merger: phasing.phase_derivative(f_merger),
            phasing,
            amp0: newtonian_amplitude_prefactor(params),
            remnant,
            f_merger,
            f_cut: MF_CUT / m_sec,
            alpha2,
            alpha3,
            eps1,
            eps2,
            w_merger,
            w_ring,
            sigma,
        };
        model.slope_at_merger -= model.ringdown_phase_derivative(f_merger);
        model
    }

    pub fn remnant(&self) -> RemnantProperties {
        self.remnant
    }

    pub fn merger_frequency(&self) -> f64 {
        self.f_merger
    }

    fn ringdown_phase(&self, f: f64) -> f64 {
        ((f - self.remnant.f_ring) / self.remnant.f_damp).atan()
    }

    fn ringdown_phase_derivative(&self, f: f64) -> f64 {
        let x = f - self.remnant.f_ring;
        let fd = self.remnant.f_damp;
        fd / (x * x + fd * fd)
    }

    fn lorentzian(&self, f: f64) -> f64 {
        let x = f - self.remnant.f_ring;
        self.sigma / (2.0 * PI * (x * x + self.sigma * self.sigma / 4.0))
    }
}

impl FrequencyModel for PhenomImr {
    fn cutoff_frequency(&self) -> f64 {
        self.f_cut
    }

    fn amplitude(&self, f: f64) -> f64 {
        if f <= 0.0 || f > self.f_cut {
            return 0.0;
        }

        let scale = self.amp0 * self.f_merger.powf(-7.0 / 6.0);
        let ratio = f / self.f_merger;
        let v = self.phasing.v(f);

        if f < self.f_merger {
            scale * ratio.powf(-7.0 / 6.0) * (1.0 + self.alpha2 * v * v + self.alpha3 * v.powi(3))
        } else if f < self.remnant.f_ring {
            scale * self.w_merger * ratio.powf(-2.0 / 3.0) * (1.0 + self.eps1 * v + self.eps2 * v * v)
        } else {
            scale * self.w_ring * self.lorentzian(f)
        }
    }

    fn phase(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 0.0;
        }

        if f <= self.f_merger {
            return self.phasing.phase(f);
        }

        self.phase_at_merger
            + self.slope_at_merger * (f - self.f_merger)
            + self.ringdown_phase(f)
            - self.ringdown_phase(self.f_merger)
    }
}
