//! Point-mass lens amplification factor `F(w, y)`.
//!
//! `w = 8 pi G M_Lz f / c^3 = 2 pi f tM` is the dimensionless frequency and
//! `y` the source offset in Einstein radii. The lensed strain is
//! `F(w, y) * h(f)`.

pub mod special;

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::LensError;
use special::{hyp1f1_series, kummer_asymptotic_tail, ln_gamma, SERIES_EPSILON};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LensModel {
    /// Exact diffraction integral, every frequency.
    WaveOptics,
    /// Two-image stationary-phase limit, every frequency.
    GeometricOptics,
    /// Wave optics while it is numerically reliable, corrected geometric
    /// optics above.
    #[default]
    Hybrid,
}

/// Numerical controls of the amplification factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    pub model: LensModel,
    /// Term budget of the Kummer series and its asymptotic expansion
    pub max_series_terms: usize,
    /// Accepted error of the wave-optics factor. The series measures it
    /// relative to the on-axis maximum of `|F|`.
    pub tolerance: f64,
    /// Hybrid stops summing the Kummer series once `w * dT(y)` reaches this
    pub geometric_phase_threshold: f64,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            model: LensModel::Hybrid,
            max_series_terms: 4000,
            tolerance: 1e-5,
            geometric_phase_threshold: 100.0,
        }
    }
}

impl LensSettings {
    pub fn validate(&self) -> Result<(), LensError> {
        if self.max_series_terms == 0 {
            return Err(LensError::InvalidConfig(
                "lens max_series_terms must be greater than zero".to_string(),
            ));
        }

        if !(self.tolerance.is_finite() && self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(LensError::InvalidConfig(
                "lens tolerance must lie in (0, 1)".to_string(),
            ));
        }

        if !self.geometric_phase_threshold.is_finite() || self.geometric_phase_threshold <= 0.0 {
            return Err(LensError::InvalidConfig(format!(
                "lens geometric_phase_threshold must be finite and positive, got {}",
                self.geometric_phase_threshold
            )));
        }

        Ok(())
    }
}

/// Which approximation produced a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    Wave,
    Geometric,
}

/// Amplification factor sampled on a frequency grid.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    pub values: Vec<Complex64>,
    /// Index of the first geometric-optics sample, if any
    pub geometric_from: Option<usize>,
}

/// Point-mass lens at a fixed source offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMassLens {
    y: f64,
    /// Arrival-time constant of the minimum image
    phi_min: f64,
    mu_plus: f64,
    mu_minus: f64,
    /// Saddle minus minimum arrival time, in units of `tM / 2`
    delay: f64,
    /// `1 / w` coefficients of the minimum and saddle images
    correction_plus: f64,
    correction_minus: f64,
}

/// Curvature term of the stationary-phase expansion for an image at `x`.
fn image_correction(x: f64) -> f64 {
    let x2 = x * x;
    (4.0 * x2 - 1.0) / (3.0 * (x2 + 1.0).powi(3) * (x2 - 1.0))
}

impl PointMassLens {
    pub fn new(y: f64) -> Result<Self, LensError> {
        if !(y.is_finite() && y > 0.0) {
            return Err(LensError::InvalidConfig(format!(
                "source offset must be finite and positive, got {y}"
            )));
        }

        let root = (y * y + 4.0).sqrt();
        let x_plus = 0.5 * (y + root);
        let x_minus = 0.5 * (y - root);
        let phi_min = 0.5 * (x_plus - y) * (x_plus - y) - x_plus.ln();
        let shear = (y * y + 2.0) / (2.0 * y * root);

        Ok(Self {
            y,
            phi_min,
            mu_plus: 0.5 + shear,
            mu_minus: 0.5 - shear,
            delay: 0.5 * y * root + ((root + y) / (root - y)).ln(),
            correction_plus: image_correction(x_plus),
            correction_minus: image_correction(x_minus),
        })
    }

    /// Magnifications `(mu_+, mu_-)` of the minimum and saddle images.
    pub fn magnifications(&self) -> (f64, f64) {
        (self.mu_plus, self.mu_minus)
    }

    /// Dimensionless time delay between the two images.
    pub fn time_delay(&self) -> f64 {
        self.delay
    }

    /// `ln(exp(pi w / 4 + i w / 2 (ln(w / 2) - 2 phi_m)) Gamma(1 - i w / 2))`
    fn ln_prefactor(&self, w: f64) -> Complex64 {
        let half_w = 0.5 * w;
        Complex64::new(PI * w / 4.0, half_w * (half_w.ln() - 2.0 * self.phi_min))
            + ln_gamma(Complex64::new(1.0, -half_w))
    }

    /// Full diffraction solution
    /// `exp(pi w / 4 + i w / 2 (ln(w / 2) - 2 phi_m)) Gamma(1 - i w / 2)
    ///  1F1(i w / 2; 1; i w y^2 / 2)`, summing the Kummer series.
    ///
    /// `None` when the series cannot be summed to `tolerance`.
    pub fn wave_optics(&self, w: f64, settings: &LensSettings) -> Option<Complex64> {
        if w == 0.0 {
            return Some(Complex64::new(1.0, 0.0));
        }

        let half_w = 0.5 * w;
        let ln_prefactor = self.ln_prefactor(w);

        // |F(w, y)| is largest on axis, where |F(w, 0)|^2 = pi w / (1 - exp(-pi w)).
        let on_axis = (PI * w / -(-PI * w).exp_m1()).sqrt();
        let bound = on_axis * (-ln_prefactor.re).exp();
        let abort_above = settings.tolerance * bound / SERIES_EPSILON;

        let series = hyp1f1_series(
            Complex64::new(0.0, half_w),
            1.0,
            Complex64::new(0.0, half_w * self.y * self.y),
            settings.max_series_terms,
            abort_above,
        )?;

        Some(ln_prefactor.exp() * series)
    }

    /// Diffraction solution from the large-argument expansion of
    /// `1F1(a; 1; z)`, `a = i w / 2`, `z = i w y^2 / 2`.
    ///
    /// `None` when the truncated tails miss `tolerance`, typically for
    /// `|z| < |a|^2`.
    pub fn wave_optics_asymptotic(&self, w: f64, settings: &LensSettings) -> Option<Complex64> {
        if !(w.is_finite() && w > 0.0) {
            return None;
        }

        let i = Complex64::new(0.0, 1.0);
        let half_w = 0.5 * w;
        let a = Complex64::new(0.0, half_w);
        let z = Complex64::new(0.0, half_w * self.y * self.y);
        let ln_z = z.ln();
        let ln_prefactor = self.ln_prefactor(w);

        // 1F1(a; 1; z) ~ e^z z^(a-1) / Gamma(a) S(1-a, z)
        //              + e^(i pi a) z^-a / Gamma(1-a) S(a, -z)
        let growing = (ln_prefactor + z + (a - 1.0) * ln_z - ln_gamma(a)).exp();
        let decaying = (ln_prefactor + i * PI * a - a * ln_z - ln_gamma(1.0 - a)).exp();

        let (growing_tail, growing_error) =
            kummer_asymptotic_tail(1.0 - a, z, settings.max_series_terms);
        let (decaying_tail, decaying_error) =
            kummer_asymptotic_tail(a, -z, settings.max_series_terms);

        let error = growing.norm() * growing_error + decaying.norm() * decaying_error;
        if !error.is_finite() || error > settings.tolerance {
            return None;
        }

        Some(growing * growing_tail + decaying * decaying_tail)
    }

    /// Stationary-phase limit `sqrt|mu_+| - i sqrt|mu_-| exp(i w dT)`.
    pub fn geometric_optics(&self, w: f64) -> Complex64 {
        let saddle = Complex64::from_polar(self.mu_minus.abs().sqrt(), w * self.delay);
        Complex64::new(self.mu_plus.sqrt(), 0.0) - Complex64::new(0.0, 1.0) * saddle
    }

    /// Geometric optics with the `1 / w` curvature terms of both images.
    pub fn corrected_geometric_optics(&self, w: f64) -> Complex64 {
        let geometric = self.geometric_optics(w);
        if w <= 0.0 {
            return geometric;
        }

        let minimum = Complex64::new(0.0, self.correction_plus * self.mu_plus.sqrt());
        let saddle = Complex64::from_polar(
            self.correction_minus * self.mu_minus.abs().sqrt(),
            w * self.delay,
        );
        geometric + (minimum + saddle) / w
    }

    /// Series first, then the asymptotic expansion, then corrected
    /// geometric optics.
    fn diffraction_factor(
        &self,
        w: f64,
        settings: &LensSettings,
        try_series: bool,
    ) -> (Complex64, Regime) {
        let wave = if try_series {
            self.wave_optics(w, settings)
        } else {
            None
        };

        match wave.or_else(|| self.wave_optics_asymptotic(w, settings)) {
            Some(value) => (value, Regime::Wave),
            None => (self.corrected_geometric_optics(w), Regime::Geometric),
        }
    }

    /// Amplification at one dimensionless frequency.
    pub fn factor_at(&self, w: f64, settings: &LensSettings) -> (Complex64, Regime) {
        match settings.model {
            LensModel::GeometricOptics => (self.geometric_optics(w), Regime::Geometric),
            LensModel::WaveOptics => self.diffraction_factor(w, settings, true),
            LensModel::Hybrid => {
                let try_series = w * self.delay < settings.geometric_phase_threshold;
                self.diffraction_factor(w, settings, try_series)
            }
        }
    }

    /// Samples `F(2 pi f tM, y)` on ascending frequencies.
    ///
    /// Under the hybrid model the first geometric sample switches every
    /// higher frequency to corrected geometric optics too: neither wave
    /// optics evaluation gets easier as `w` grows.
    pub fn transfer_function(
        &self,
        freqs: &[f64],
        t_m: f64,
        settings: &LensSettings,
    ) -> TransferFunction {
        let mut values = Vec::with_capacity(freqs.len());
        let mut geometric_from = None;

        for (idx, &f) in freqs.iter().enumerate() {
            let w = 2.0 * PI * f * t_m;

            if geometric_from.is_some() && settings.model == LensModel::Hybrid {
                values.push(self.corrected_geometric_optics(w));
                continue;
            }

            let (value, regime) = self.factor_at(w, settings);
            if regime == Regime::Geometric && geometric_from.is_none() {
                geometric_from = Some(idx);
            }
            values.push(value);
        }

        TransferFunction {
            values,
            geometric_from,
        }
    }
}

/// Hybrid amplification factor of a point-mass lens with time scale `t_m`
/// [s] at offset `y`, sampled at `freqs` [Hz].
pub fn hybrid_factor(
    freqs: &[f64],
    t_m: f64,
    y: f64,
    settings: &LensSettings,
) -> Result<Vec<Complex64>, LensError> {
    let lens = PointMassLens::new(y)?;
    Ok(lens.transfer_function(freqs, t_m, settings).values)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use num_complex::Complex64;
    use proptest::prelude::*;

    use super::{hybrid_factor, LensModel, LensSettings, PointMassLens, Regime};

    #[test]
    fn zero_frequency_is_unlensed() {
        let lens = PointMassLens::new(0.3).unwrap();
        let value = lens.wave_optics(0.0, &LensSettings::default()).unwrap();
        assert_eq!(value, Complex64::new(1.0, 0.0));
    }

    #[test]
    fn low_frequency_limit_approaches_unity() {
        let lens = PointMassLens::new(0.5).unwrap();
        let value = lens.wave_optics(1e-3, &LensSettings::default()).unwrap();
        assert!((value - Complex64::new(1.0, 0.0)).norm() < 1e-2, "F = {value}");
    }

    #[test]
    fn wave_optics_approaches_geometric_optics() {
        let lens = PointMassLens::new(1.0).unwrap();
        let settings = LensSettings::default();
        let w = 20.0;
        let wave = lens.wave_optics(w, &settings).unwrap();
        let geo = lens.geometric_optics(w);
        let corrected = lens.corrected_geometric_optics(w);
        assert!((wave - geo).norm() < 0.1, "wave {wave} geo {geo}");
        assert!((wave - corrected).norm() < 1e-3, "wave {wave} corrected {corrected}");
    }

    #[test]
    fn series_reaches_the_phase_threshold_and_meets_corrected_geometric_optics() {
        let settings = LensSettings::default();
        for y in [0.3, 1.0] {
            let lens = PointMassLens::new(y).unwrap();
            let w = 0.99 * settings.geometric_phase_threshold / lens.time_delay();
            let wave = lens.wave_optics(w, &settings).unwrap();
            let corrected = lens.corrected_geometric_optics(w);
            assert!((wave - corrected).norm() < 1e-4, "y {y} w {w}: {wave} vs {corrected}");
            assert!((wave - lens.geometric_optics(w)).norm() > 1e-3);
        }
    }

    #[test]
    fn hybrid_transfer_function_is_continuous_at_the_switch() {
        let settings = LensSettings::default();
        let t_m = 0.01;
        let freqs: Vec<f64> = (1..=4000).map(f64::from).collect();
        for y in [0.3, 1.0, 3.0] {
            let lens = PointMassLens::new(y).unwrap();
            let transfer = lens.transfer_function(&freqs, t_m, &settings);
            let switch = transfer.geometric_from.unwrap();
            assert!(switch > 0);

            let w = 2.0 * PI * freqs[switch - 1] * t_m;
            let jump = (transfer.values[switch - 1] - lens.corrected_geometric_optics(w)).norm();
            assert!(jump < 1e-4, "y {y}: |F_wave - F_geo| = {jump} at w {w}");
        }
    }

    #[test]
    fn asymptotic_expansion_agrees_with_the_series() {
        let settings = LensSettings::default();
        let lens = PointMassLens::new(10.0).unwrap();
        let series = lens.wave_optics(1.0, &settings).unwrap();
        let asymptotic = lens.wave_optics_asymptotic(1.0, &settings).unwrap();
        assert!((series - asymptotic).norm() < 1e-9, "{series} vs {asymptotic}");
    }

    #[test]
    fn asymptotic_expansion_declines_small_offsets() {
        let lens = PointMassLens::new(0.1).unwrap();
        assert!(lens.wave_optics_asymptotic(50.0, &LensSettings::default()).is_none());
        assert!(lens.wave_optics_asymptotic(0.0, &LensSettings::default()).is_none());
    }

    #[test]
    fn unit_offset_magnifications() {
        let lens = PointMassLens::new(1.0).unwrap();
        let (plus, minus) = lens.magnifications();
        assert_relative_eq!(plus, 0.5 + 3.0 / (2.0 * 5f64.sqrt()), epsilon = 1e-12);
        assert_relative_eq!(minus, 0.5 - 3.0 / (2.0 * 5f64.sqrt()), epsilon = 1e-12);
        assert_relative_eq!(
            lens.time_delay(),
            5f64.sqrt() / 2.0 + ((5f64.sqrt() + 1.0) / (5f64.sqrt() - 1.0)).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn hybrid_switches_once_and_stays_geometric() {
        let lens = PointMassLens::new(0.1).unwrap();
        let settings = LensSettings {
            geometric_phase_threshold: 5.0,
            ..LensSettings::default()
        };
        let freqs: Vec<f64> = (0..2000).map(|k| k as f64 * 0.5).collect();
        let transfer = lens.transfer_function(&freqs, 0.01, &settings);
        let switch = transfer.geometric_from.unwrap();
        assert!(switch > 0);
        for (idx, value) in transfer.values.iter().enumerate().skip(switch) {
            let w = 2.0 * PI * freqs[idx] * 0.01;
            assert_eq!(*value, lens.corrected_geometric_optics(w));
        }
    }

    #[test]
    fn geometric_model_never_sums_the_series() {
        let lens = PointMassLens::new(0.2).unwrap();
        let settings = LensSettings {
            model: LensModel::GeometricOptics,
            ..LensSettings::default()
        };
        let (_, regime) = lens.factor_at(0.01, &settings);
        assert_eq!(regime, Regime::Geometric);
    }

    #[test]
    fn phase_threshold_must_be_finite_and_positive() {
        for threshold in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            let settings = LensSettings {
                geometric_phase_threshold: threshold,
                ..LensSettings::default()
            };
            assert!(settings.validate().is_err(), "accepted {threshold}");
        }
        assert!(LensSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_offset() {
        assert!(PointMassLens::new(0.0).is_err());
        assert!(hybrid_factor(&[1.0], 1e-3, -1.0, &LensSettings::default()).is_err());
    }

    #[test]
    fn negligible_lens_mass_leaves_signal_untouched() {
        let freqs: Vec<f64> = (0..512).map(|k| k as f64 * 4.0).collect();
        let factor = hybrid_factor(&freqs, 2e-5 * 1e-6, 1.0, &LensSettings::default()).unwrap();
        for value in factor {
            assert!((value - Complex64::new(1.0, 0.0)).norm() < 1e-3);
        }
    }

    proptest! {
        #[test]
        fn minimum_image_is_magnified(y in 1e-3_f64..1e2) {
            let lens = PointMassLens::new(y).unwrap();
            let (plus, minus) = lens.magnifications();
            prop_assert!(plus >= 1.0);
            prop_assert!(minus <= 0.0);
            prop_assert!(plus + minus.abs() >= 1.0);
            prop_assert!((plus + minus - 1.0).abs() < 1e-9);
            prop_assert!(lens.time_delay() > 0.0);
        }

        #[test]
        fn geometric_modulus_is_bounded_by_image_sum(y in 1e-2_f64..10.0, w in 0.0_f64..1e3) {
            let lens = PointMassLens::new(y).unwrap();
            let (plus, minus) = lens.magnifications();
            let modulus = lens.geometric_optics(w).norm();
            prop_assert!(modulus <= plus.sqrt() + minus.abs().sqrt() + 1e-12);
            prop_assert!(modulus >= plus.sqrt() - minus.abs().sqrt() - 1e-12);
        }
    }
}
