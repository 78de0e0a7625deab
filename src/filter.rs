//! Noise-weighted inner products and the time/phase maximized match.

use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::series::FrequencySeries;
use crate::LensError;

/// Half-open bin range `[kmin, kmax)` of a one-sided series of `len` bins.
///
/// Without an upper cutoff the Nyquist bin is excluded.
pub fn cutoff_indices(
    len: usize,
    delta_f: f64,
    low_frequency_cutoff: f64,
    high_frequency_cutoff: Option<f64>,
) -> Result<(usize, usize), LensError> {
    let kmin = (low_frequency_cutoff / delta_f).floor().max(0.0) as usize;
    let kmax = match high_frequency_cutoff {
        Some(f_high) => ((f_high / delta_f).floor() as usize).min(len),
        None => len.saturating_sub(1),
    };

    if kmin >= kmax {
        return Err(LensError::InvalidConfig(format!(
            "empty analysis band: kmin {kmin} >= kmax {kmax}"
        )));
    }

    Ok((kmin, kmax))
}

fn ensure_compatible(
    context: &'static str,
    h: &FrequencySeries,
    psd: &FrequencySeries<f64>,
) -> Result<(), LensError> {
    if h.len() != psd.len() {
        return Err(LensError::LengthMismatch {
            context,
            expected: h.len(),
            got: psd.len(),
        });
    }

    if (h.delta_f() - psd.delta_f()).abs() > 1e-12 * h.delta_f() {
        return Err(LensError::InvalidConfig(format!(
            "{context}: delta_f mismatch ({} vs {})",
            h.delta_f(),
            psd.delta_f()
        )));
    }

    Ok(())
}

/// `<h, h> = 4 delta_f sum |h_k|^2 / S_k` over the analysis band.
///
/// Bins where the PSD is zero carry no weight.
pub fn sigmasq(
    h: &FrequencySeries,
    psd: &FrequencySeries<f64>,
    low_frequency_cutoff: f64,
    high_frequency_cutoff: Option<f64>,
) -> Result<f64, LensError> {
    ensure_compatible("sigmasq psd", h, psd)?;
    let (kmin, kmax) = cutoff_indices(h.len(), h.delta_f(), low_frequency_cutoff, high_frequency_cutoff)?;

    let sum: f64 = h.data()[kmin..kmax]
        .iter()
        .zip(psd.data()[kmin..kmax].iter())
        .filter(|(_, &s)| s > 0.0)
        .map(|(value, &s)| value.norm_sqr() / s)
        .sum();

    Ok(4.0 * h.delta_f() * sum)
}

/// Optimal signal-to-noise ratio.
pub fn sigma(
    h: &FrequencySeries,
    psd: &FrequencySeries<f64>,
    low_frequency_cutoff: f64,
) -> Result<f64, LensError> {
    Ok(sigmasq(h, psd, low_frequency_cutoff, None)?.sqrt())
}

/// Refines a sampled maximum with a parabola through three neighbours.
///
/// Returns `(bin offset in [-0.5, 0.5], interpolated peak value)`.
pub fn quadratic_interpolate_peak(left: f64, middle: f64, right: f64) -> (f64, f64) {
    let denom = left - 2.0 * middle + right;
    if denom == 0.0 {
        return (0.0, middle);
    }

    let offset = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    let peak = middle - 0.25 * (left - right) * offset;
    (offset, peak)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    /// Normalized overlap maximized over time and phase, in `[0, 1]`
    pub value: f64,
    /// Time-lag sample of the maximum
    pub peak_index: usize,
    /// Sub-sample correction of the lag, zero unless interpolation is on
    pub peak_offset: f64,
}

impl MatchOutcome {
    pub fn mismatch(&self) -> f64 {
        1.0 - self.value
    }
}

/// Per-thread buffers for [`Matcher::overlap_match`].
pub struct MatchWorkspace {
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

/// Plans the inverse FFT once for a fixed series length and reuses it for
/// every match.
#[derive(Clone)]
pub struct Matcher {
    fft: Arc<dyn Fft<f64>>,
    series_len: usize,
    subsample_interpolation: bool,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("series_len", &self.series_len)
            .field("fft_len", &self.fft_len())
            .field("subsample_interpolation", &self.subsample_interpolation)
            .finish()
    }
}

impl Matcher {
    /// `series_len` is the one-sided length; the time series has
    /// `2 (series_len - 1)` samples.
    pub fn new(series_len: usize, subsample_interpolation: bool) -> Result<Self, LensError> {
        if series_len < 2 {
            return Err(LensError::InvalidConfig(format!(
                "match needs at least two frequency bins, got {series_len}"
            )));
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_inverse(2 * (series_len - 1));

        Ok(Self {
            fft,
            series_len,
            subsample_interpolation,
        })
    }

    pub fn fft_len(&self) -> usize {
        2 * (self.series_len - 1)
    }

    pub fn workspace(&self) -> MatchWorkspace {
        MatchWorkspace {
            buffer: vec![Complex64::new(0.0, 0.0); self.fft_len()],
            scratch: vec![Complex64::new(0.0, 0.0); self.fft.get_inplace_scratch_len()],
        }
    }

    /// Match of `h1` against `h2` weighted by `psd`.
    ///
    /// The complex overlap `4 delta_f sum conj(h1) h2 / S exp(2 pi i f t)` is
    /// evaluated for every circular time lag by one inverse FFT; its largest
    /// modulus maximizes over time and phase at once.
    pub fn overlap_match(
        &self,
        workspace: &mut MatchWorkspace,
        h1: &FrequencySeries,
        h2: &FrequencySeries,
        psd: &FrequencySeries<f64>,
        low_frequency_cutoff: f64,
    ) -> Result<MatchOutcome, LensError> {
        if h1.len() != self.series_len {
            return Err(LensError::LengthMismatch {
                context: "match template",
                expected: self.series_len,
                got: h1.len(),
            });
        }
        if h2.len() != self.series_len {
            return Err(LensError::LengthMismatch {
                context: "match data",
                expected: self.series_len,
                got: h2.len(),
            });
        }
        ensure_compatible("match psd", h1, psd)?;

        let norm1 = sigmasq(h1, psd, low_frequency_cutoff, None)?;
        let norm2 = sigmasq(h2, psd, low_frequency_cutoff, None)?;
        if norm1 <= 0.0 {
            return Err(LensError::ZeroNorm("match template has zero power in band"));
        }
        if norm2 <= 0.0 {
            return Err(LensError::ZeroNorm("match data has zero power in band"));
        }

        let (kmin, kmax) = cutoff_indices(self.series_len, h1.delta_f(), low_frequency_cutoff, None)?;

        let buffer = &mut workspace.buffer;
        buffer.fill(Complex64::new(0.0, 0.0));
        for k in kmin..kmax {
            let s = psd.data()[k];
            if s > 0.0 {
                buffer[k] = h1.data()[k].conj() * h2.data()[k] / s;
            }
        }

        self.fft.process_with_scratch(buffer, &mut workspace.scratch);

        let (peak_index, peak_sq) = buffer
            .iter()
            .map(|value| value.norm_sqr())
            .enumerate()
            .fold((0_usize, f64::NEG_INFINITY), |best, (idx, value)| {
                if value > best.1 {
                    (idx, value)
                } else {
                    best
                }
            });
        let mut peak = peak_sq.sqrt();
        let mut peak_offset = 0.0;

        if self.subsample_interpolation {
            let n = buffer.len();
            let left = buffer[(peak_index + n - 1) % n].norm();
            let right = buffer[(peak_index + 1) % n].norm();
            let (offset, refined) = quadratic_interpolate_peak(left, peak, right);
            peak_offset = offset;
            peak = refined;
        }

        let value = 4.0 * h1.delta_f() * peak / (norm1 * norm2).sqrt();

        Ok(MatchOutcome {
            value,
            peak_index,
            peak_offset,
        })
    }
}

/// One-off match; plans a fresh FFT on every call.
pub fn overlap_match(
    h1: &FrequencySeries,
    h2: &FrequencySeries,
    psd: &FrequencySeries<f64>,
    low_frequency_cutoff: f64,
) -> Result<MatchOutcome, LensError> {
    let matcher = Matcher::new(h1.len(), false)?;
    let mut workspace = matcher.workspace();
    matcher.overlap_match(&mut workspace, h1, h2, psd, low_frequency_cutoff)
}
