//! Uniformly sampled one-sided frequency series.

use num_complex::Complex64;

use crate::LensError;

/// Samples at `k * delta_f` for `k = 0..len`.
///
/// Waveforms are stored as `FrequencySeries<Complex64>`, noise curves as
/// `FrequencySeries<f64>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySeries<T = Complex64> {
    data: Vec<T>,
    delta_f: f64,
}

impl<T: Clone + Default> FrequencySeries<T> {
    pub fn new(data: Vec<T>, delta_f: f64) -> Result<Self, LensError> {
        if !(delta_f.is_finite() && delta_f > 0.0) {
            return Err(LensError::InvalidConfig(format!(
                "delta_f must be finite and positive, got {delta_f}"
            )));
        }

        Ok(Self { data, delta_f })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn delta_f(&self) -> f64 {
        self.delta_f
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn sample_frequency(&self, idx: usize) -> f64 {
        idx as f64 * self.delta_f
    }

    pub fn sample_frequencies(&self) -> Vec<f64> {
        (0..self.data.len())
            .map(|idx| self.sample_frequency(idx))
            .collect()
    }

    /// Zero-pads or truncates to `len` samples.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, T::default());
    }

    pub fn resized(&self, len: usize) -> Self {
        let mut out = self.clone();
        out.resize(len);
        out
    }
}

impl FrequencySeries<Complex64> {
    /// Elementwise product with a transfer function sampled on the same grid.
    pub fn multiplied_by(&self, factor: &[Complex64]) -> Result<Self, LensError> {
        if factor.len() != self.data.len() {
            return Err(LensError::LengthMismatch {
                context: "transfer function",
                expected: self.data.len(),
                got: factor.len(),
            });
        }

        let data = self
            .data
            .iter()
            .zip(factor.iter())
            .map(|(h, f)| h * f)
            .collect();

        Ok(Self {
            data,
            delta_f: self.delta_f,
        })
    }
}
