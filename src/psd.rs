//! Detector noise power spectral densities.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::series::FrequencySeries;
use crate::LensError;

/// One-sided noise PSD source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NoiseCurve {
    /// Einstein Telescope, ET-B analytic fit (Mishra et al. 2010).
    #[default]
    EinsteinTelescope,
    /// Advanced LIGO, zero-detuned high-power analytic fit.
    AdvancedLigo,
    /// Initial LIGO design analytic fit.
    InitialLigo,
    /// Two-column ASCII table `frequency value`, log-log interpolated.
    File {
        path: PathBuf,
        /// Second column is an amplitude spectral density to be squared.
        #[serde(default)]
        is_asd: bool,
    },
}

impl NoiseCurve {
    pub fn name(&self) -> String {
        match self {
            Self::EinsteinTelescope => "EinsteinTelescopeB".to_string(),
            Self::AdvancedLigo => "aLIGOZeroDetHighPower".to_string(),
            Self::InitialLigo => "iLIGODesign".to_string(),
            Self::File { path, .. } => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// Analytic PSD at `f` [1/Hz]; `None` for tabulated curves.
    pub fn analytic_value(&self, f: f64) -> Option<f64> {
        match self {
            Self::EinsteinTelescope => Some(einstein_telescope_b(f)),
            Self::AdvancedLigo => Some(advanced_ligo_zdhp(f)),
            Self::InitialLigo => Some(initial_ligo(f)),
            Self::File { .. } => None,
        }
    }

    /// Samples the curve at `k * delta_f` for `k = 0..length`.
    ///
    /// Bins below `low_freq_cutoff` (and, for tables, outside the tabulated
    /// range) are zero.
    pub fn build(
        &self,
        length: usize,
        delta_f: f64,
        low_freq_cutoff: f64,
    ) -> Result<FrequencySeries<f64>, LensError> {
        let kmin = ((low_freq_cutoff / delta_f) as usize).max(1);

        let data = match self {
            Self::File { path, is_asd } => {
                let table = NoiseTable::from_txt(path, *is_asd)?;
                (0..length)
                    .map(|k| {
                        if k < kmin {
                            0.0
                        } else {
                            table.interpolate(k as f64 * delta_f)
                        }
                    })
                    .collect()
            }
            analytic => (0..length)
                .map(|k| {
                    if k < kmin {
                        0.0
                    } else {
                        analytic
                            .analytic_value(k as f64 * delta_f)
                            .unwrap_or(0.0)
                    }
                })
                .collect(),
        };

        FrequencySeries::new(data, delta_f)
    }
}

impl fmt::Display for NoiseCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn einstein_telescope_b(f: f64) -> f64 {
    let x = f / 100.0;
    let sum = 2.39e-27 * x.powf(-15.64)
        + 0.349 * x.powf(-2.145)
        + 1.76 * x.powf(-0.12)
        + 0.409 * x.powf(1.10);
    1.0e-50 * sum * sum
}

fn advanced_ligo_zdhp(f: f64) -> f64 {
    let x = f / 215.0;
    let x2 = x * x;
    1.0e-49 * (x.powf(-4.14) - 5.0 * x.powi(-2) + 111.0 * (1.0 - x2 + x2 * x2 / 2.0) / (1.0 + x2 / 2.0))
}

fn initial_ligo(f: f64) -> f64 {
    let x = f / 150.0;
    9.0e-46 * ((4.49 * x).powf(-56.0) + 0.16 * x.powf(-4.52) + 0.52 + 0.32 * x * x)
}

/// Tabulated PSD stored as `(ln f, ln S)` pairs.
#[derive(Debug, Clone)]
pub struct NoiseTable {
    log_f: Vec<f64>,
    log_s: Vec<f64>,
}

impl NoiseTable {
    pub fn from_txt(path: &Path, is_asd: bool) -> Result<Self, LensError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw, path, is_asd)
    }

    pub fn parse(raw: &str, path: &Path, is_asd: bool) -> Result<Self, LensError> {
        let parse_error = |line: usize, reason: String| LensError::NoiseCurveParse {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut log_f = Vec::new();
        let mut log_s = Vec::new();

        for (idx, line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
                continue;
            }

            let mut fields = trimmed.split(|c: char| c.is_whitespace() || c == ',');
            let mut next_value = |name: &str| -> Result<f64, LensError> {
                let token = fields
                    .by_ref()
                    .find(|token| !token.is_empty())
                    .ok_or_else(|| parse_error(line_no, format!("missing {name} column")))?;
                token
                    .parse::<f64>()
                    .map_err(|err| parse_error(line_no, format!("bad {name} '{token}': {err}")))
            };

            let freq = next_value("frequency")?;
            let value = next_value("noise")?;

            if !(freq > 0.0 && value > 0.0 && freq.is_finite() && value.is_finite()) {
                return Err(parse_error(
                    line_no,
                    "frequency and noise must be finite and positive".to_string(),
                ));
            }

            if let Some(&last) = log_f.last() {
                if freq.ln() <= last {
                    return Err(parse_error(
                        line_no,
                        "frequencies must be strictly increasing".to_string(),
                    ));
                }
            }

            let psd = if is_asd { value * value } else { value };
            log_f.push(freq.ln());
            log_s.push(psd.ln());
        }

        if log_f.len() < 2 {
            return Err(parse_error(
                raw.lines().count(),
                "at least two samples are required".to_string(),
            ));
        }

        Ok(Self { log_f, log_s })
    }

    /// Log-log linear interpolation; zero outside the tabulated range.
    pub fn interpolate(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 0.0;
        }

        let x = f.ln();
        let n = self.log_f.len();
        if x < self.log_f[0] || x > self.log_f[n - 1] {
            return 0.0;
        }

        let upper = self.log_f.partition_point(|&value| value < x).clamp(1, n - 1);
        let lower = upper - 1;
        let span = self.log_f[upper] - self.log_f[lower];
        let t = (x - self.log_f[lower]) / span;
        (self.log_s[lower] + t * (self.log_s[upper] - self.log_s[lower])).exp()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use approx::assert_relative_eq;

    use super::{NoiseCurve, NoiseTable};

    #[test]
    fn bins_below_cutoff_are_zero() {
        let psd = NoiseCurve::EinsteinTelescope.build(1025, 0.25, 10.0).unwrap();
        assert!(psd.data()[..40].iter().all(|&s| s == 0.0));
        assert!(psd.data()[40..].iter().all(|&s| s > 0.0));
    }

    #[test]
    fn analytic_curves_have_plausible_sensitivity() {
        let et = NoiseCurve::EinsteinTelescope.analytic_value(100.0).unwrap().sqrt();
        let aligo = NoiseCurve::AdvancedLigo.analytic_value(215.0).unwrap().sqrt();
        let iligo = NoiseCurve::InitialLigo.analytic_value(150.0).unwrap().sqrt();

        assert!(et > 1e-25 && et < 1e-24, "ET ASD {et}");
        assert!(aligo > 1e-24 && aligo < 1e-23, "aLIGO ASD {aligo}");
        assert!(iligo > 1e-23 && iligo < 1e-22, "iLIGO ASD {iligo}");
        assert!(et < aligo && aligo < iligo);
    }

    #[test]
    fn table_interpolates_power_laws_exactly() {
        let raw = "# f asd\n1 1e-20\n100 1e-22\n";
        let table = NoiseTable::parse(raw, Path::new("mem.txt"), true).unwrap();
        assert_relative_eq!(table.interpolate(10.0), 1e-42, max_relative = 1e-9);
        assert_eq!(table.interpolate(0.5), 0.0);
        assert_eq!(table.interpolate(200.0), 0.0);
    }

    #[test]
    fn table_rejects_unsorted_frequencies() {
        let raw = "10 1e-46\n5 1e-46\n";
        let err = NoiseTable::parse(raw, Path::new("bad.txt"), false).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn file_curve_is_built_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "5 1e-46").unwrap();
        writeln!(file, "5000 1e-46").unwrap();

        let curve = NoiseCurve::File {
            path: file.path().to_path_buf(),
            is_asd: false,
        };
        let psd = curve.build(65, 1.0, 10.0).unwrap();
        assert_eq!(psd.data()[9], 0.0);
        assert_relative_eq!(psd.data()[10], 1e-46, max_relative = 1e-9);
    }

    #[test]
    fn noise_curve_json_is_tagged() {
        let curve: NoiseCurve =
            serde_json::from_str(r#"{"kind": "File", "path": "et_d.txt", "is_asd": true}"#).unwrap();
        assert_eq!(curve.name(), "et_d");
        let curve: NoiseCurve = serde_json::from_str(r#"{"kind": "AdvancedLigo"}"#).unwrap();
        assert_eq!(curve, NoiseCurve::AdvancedLigo);
    }
}
