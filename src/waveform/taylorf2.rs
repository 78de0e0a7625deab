use std::f64::consts::PI;

use crate::constants::{C_SI, GAMMA_E, MTSUN_SI};
use crate::waveform::{FrequencyModel, WaveformParams};

/// 3.5PN stationary-phase phasing with leading-order spin-orbit and
/// spin-spin terms.
///
/// The phase is written as a function of `v = (pi M f)^(1/3)`:
/// `Psi = 3 / (128 eta) * sum_k c_k(v) v^(k - 5)`, with the coalescence time
/// and phase set to zero.
#[derive(Debug, Clone)]
pub struct PnPhasing {
    pub(crate) m_sec: f64,
    prefactor: f64,
    c2: f64,
    c3: f64,
    c4: f64,
    c5: f64,
    c6: f64,
    c6_log: f64,
    c7: f64,
}

impl PnPhasing {
    pub fn new(params: &WaveformParams) -> Self {
        let eta = params.eta();
        let m = params.total_mass();
        let q1 = params.mass1 / m;
        let q2 = params.mass2 / m;

        let beta = (params.spin1z * (113.0 * q1 * q1 + 75.0 * eta)
            + params.spin2z * (113.0 * q2 * q2 + 75.0 * eta))
            / 12.0;
        let sigma = eta * (721.0 - 247.0) / 48.0 * params.spin1z * params.spin2z;

        let c2 = 3715.0 / 756.0 + 55.0 / 9.0 * eta;
        let c3 = -16.0 * PI + 4.0 * beta;
        let c4 = 15_293_365.0 / 508_032.0 + 27_145.0 / 504.0 * eta + 3085.0 / 72.0 * eta * eta
            - 10.0 * sigma;
        let c5 = PI * (38_645.0 / 756.0 - 65.0 / 9.0 * eta);
        let c6_log = -6848.0 / 21.0;
        let c6 = 11_583_231_236_531.0 / 4_694_215_680.0 - 640.0 / 3.0 * PI * PI
            - 6848.0 / 21.0 * GAMMA_E
            + c6_log * 4f64.ln()
            + (-15_737_765_635.0 / 3_048_192.0 + 2255.0 / 12.0 * PI * PI) * eta
            + 76_055.0 / 1728.0 * eta * eta
            - 127_825.0 / 1296.0 * eta * eta * eta;
        let c7 = PI * (77_096_675.0 / 254_016.0 + 378_515.0 / 1512.0 * eta
            - 74_045.0 / 756.0 * eta * eta);

        Self {
            m_sec: params.total_mass_seconds(),
            prefactor: 3.0 / (128.0 * eta),
            c2,
            c3,
            c4,
            c5,
            c6,
            c6_log,
            c7,
        }
    }

    pub fn v(&self, f: f64) -> f64 {
        (PI * self.m_sec * f).cbrt()
    }

    pub fn phase(&self, f: f64) -> f64 {
        let v = self.v(f);
        let ln_v = v.ln();
        let v2 = v * v;

        self.prefactor
            * (v.powi(-5)
                + self.c2 * v.powi(-3)
                + self.c3 * v.powi(-2)
                + self.c4 / v
                + self.c5 * (1.0 + 3.0 * ln_v)
                + (self.c6 + self.c6_log * ln_v) * v
                + self.c7 * v2)
    }

    /// `dPsi/df` [rad/Hz].
    pub fn phase_derivative(&self, f: f64) -> f64 {
        let v = self.v(f);
        let dpsi_dv = self.prefactor
            * (-5.0 * v.powi(-6)
                - 3.0 * self.c2 * v.powi(-4)
                - 2.0 * self.c3 * v.powi(-3)
                - self.c4 * v.powi(-2)
                + 3.0 * self.c5 / v
                + self.c6
                + self.c6_log * (v.ln() + 1.0)
                + 2.0 * self.c7 * v);
        dpsi_dv * v / (3.0 * f)
    }
}

/// Newtonian stationary-phase amplitude prefactor: `|h(f)| = A0 f^(-7/6)`.
pub fn newtonian_amplitude_prefactor(params: &WaveformParams) -> f64 {
    let mc_sec = params.chirp_mass() * MTSUN_SI;
    (5.0_f64 / 24.0).sqrt() * PI.powf(-2.0 / 3.0) * C_SI / params.distance_m()
        * mc_sec.powf(5.0 / 6.0)
}

/// Schwarzschild innermost-stable-circular-orbit gravitational-wave
/// frequency [Hz].
pub fn isco_frequency(m_sec: f64) -> f64 {
    1.0 / (6f64.powf(1.5) * PI * m_sec)
}

#[derive(Debug, Clone)]
pub struct TaylorF2 {
    phasing: PnPhasing,
    amp0: f64,
    f_isco: f64,
}

impl TaylorF2 {
    pub fn new(params: &WaveformParams) -> Self {
        let phasing = PnPhasing::new(params);
        let f_isco = isco_frequency(phasing.m_sec);
        Self {
            phasing,
            amp0: newtonian_amplitude_prefactor(params),
            f_isco,
        }
    }
}

impl FrequencyModel for TaylorF2 {
    fn cutoff_frequency(&self) -> f64 {
        self.f_isco
    }

    fn amplitude(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 0.0;
        }
        self.amp0 * f.powf(-7.0 / 6.0)
    }

    fn phase(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 0.0;
        }
        self.phasing.phase(f)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{isco_frequency, PnPhasing, TaylorF2};
    use crate::constants::MTSUN_SI;
    use crate::waveform::{Approximant, FrequencyModel, WaveformParams};

    fn params() -> WaveformParams {
        WaveformParams {
            approximant: Approximant::TaylorF2,
            mass1: 10.0,
            mass2: 10.0,
            spin1z: 0.0,
            spin2z: 0.0,
            distance_mpc: 100_000.0,
        }
    }

    #[test]
    fn isco_of_twenty_solar_masses() {
        let f = isco_frequency(20.0 * MTSUN_SI);
        assert!((f - 219.85).abs() < 0.1, "f_isco = {f}");
    }

    #[test]
    fn analytic_derivative_matches_finite_difference() {
        let phasing = PnPhasing::new(&params());
        for f in [20.0, 55.0, 140.0] {
            let h = 1e-4;
            let numeric = (phasing.phase(f + h) - phasing.phase(f - h)) / (2.0 * h);
            assert_relative_eq!(phasing.phase_derivative(f), numeric, max_relative = 1e-6);
        }
    }

    #[test]
    fn time_to_coalescence_shrinks_with_frequency() {
        // t(f) = Psi'(f) / 2 pi must increase towards the merger.
        let phasing = PnPhasing::new(&params());
        let early = phasing.phase_derivative(20.0);
        let late = phasing.phase_derivative(100.0);
        assert!(early < late);
        assert!(early < 0.0);
    }

    #[test]
    fn amplitude_follows_minus_seven_sixths() {
        let model = TaylorF2::new(&params());
        let ratio = model.amplitude(20.0) / model.amplitude(40.0);
        assert_relative_eq!(ratio, 2f64.powf(7.0 / 6.0), max_relative = 1e-12);
    }

    #[test]
    fn aligned_spin_shifts_the_phase() {
        let mut spinning = params();
        spinning.spin1z = 0.5;
        spinning.spin2z = 0.5;
        let a = PnPhasing::new(&params()).phase(50.0);
        let b = PnPhasing::new(&spinning).phase(50.0);
        assert!((a - b).abs() > 1.0);
    }
}
