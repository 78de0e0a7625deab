use std::f64::consts::PI;

use num_complex::Complex64;

use crate::LensError;

/// Argument of every sample with jumps larger than `pi` removed.
pub fn unwrap_phase(values: &[Complex64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;

    for value in values {
        let raw = value.arg();
        if let Some(prev_raw) = previous {
            let delta = raw - prev_raw;
            if delta > PI {
                offset -= 2.0 * PI * ((delta + PI) / (2.0 * PI)).floor();
            } else if delta < -PI {
                offset += 2.0 * PI * ((-delta + PI) / (2.0 * PI)).floor();
            }
        }
        previous = Some(raw);
        out.push(raw + offset);
    }

    out
}

/// Ordinary least-squares line `y = slope * x + intercept`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64), LensError> {
    if x.len() != y.len() {
        return Err(LensError::LengthMismatch {
            context: "linear fit",
            expected: x.len(),
            got: y.len(),
        });
    }

    if x.len() < 2 {
        return Err(LensError::InvalidConfig(
            "linear fit needs at least two samples".to_string(),
        ));
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (sxy, sxx) = x
        .iter()
        .zip(y.iter())
        .fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });

    if sxx == 0.0 {
        return Err(LensError::InvalidConfig(
            "linear fit abscissae are all equal".to_string(),
        ));
    }

    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

/// Strips the best-fit linear phase `slope * f` from a transfer function.
///
/// A linear phase in frequency is a pure time shift; removing it keeps the
/// lensed signal aligned with the unlensed one. Returns the fitted slope
/// [rad/Hz].
pub fn remove_time_shift(freqs: &[f64], factor: &mut [Complex64]) -> Result<f64, LensError> {
    let phase = unwrap_phase(factor);
    let (slope, _) = linear_fit(freqs, &phase)?;

    for (value, &f) in factor.iter_mut().zip(freqs.iter()) {
        *value *= Complex64::from_polar(1.0, -slope * f);
    }

    Ok(slope)
}
