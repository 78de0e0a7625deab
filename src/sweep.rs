use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::phase::remove_time_shift;
use crate::config::SweepConfig;
use crate::constants::LENS_TIME_PER_MSUN;
use crate::filter::{sigma, MatchWorkspace, Matcher};
use crate::lens::{LensModel, LensSettings, PointMassLens};
use crate::output::{
    utc_now_string, write_grid_csv, write_manifest_json, write_npz, Manifest, NpyArray,
    MANIFEST_JSON, OUTPUT_SCHEMA_VERSION, RESULT_CSV, RESULT_NPZ,
};
use crate::series::FrequencySeries;
use crate::waveform::generate_fd_waveform;
use crate::LensError;

/// One `(ML, y)` grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub ml: f64,
    pub y: f64,
    pub snr_ratio: f64,
    pub mismatch: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub output_dir: Option<PathBuf>,
    pub ml_grid: Vec<f64>,
    pub y_grid: Vec<f64>,
    /// Row-major: lens mass outer, source offset inner
    pub cells: Vec<GridCell>,
    pub snr_unlensed: f64,
    pub geometric_cells: usize,
}

impl SweepResult {
    pub fn cell(&self, ml_idx: usize, y_idx: usize) -> Option<&GridCell> {
        if ml_idx >= self.ml_grid.len() || y_idx >= self.y_grid.len() {
            return None;
        }
        self.cells.get(ml_idx * self.y_grid.len() + y_idx)
    }

    /// `[nM, ny, 4]` array of `(ML, y, SNR ratio, mismatch)` in C order.
    pub fn result_array(&self) -> Vec<f64> {
        self.cells
            .iter()
            .flat_map(|cell| [cell.ml, cell.y, cell.snr_ratio, cell.mismatch])
            .collect()
    }
}

/// Outcome of lensing the reference waveform once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensedPrediction {
    pub snr_unlensed: f64,
    pub snr_lensed: f64,
    pub mismatch: f64,
    /// First frequency index evaluated in geometric optics
    pub geometric_from: Option<usize>,
}

/// Everything that stays fixed across the grid.
#[derive(Debug, Clone)]
pub struct LensingContext {
    /// Waveform on its native frequency grid
    native: FrequencySeries,
    native_freqs: Vec<f64>,
    /// Waveform resized to the PSD length
    unlensed: FrequencySeries,
    psd: FrequencySeries<f64>,
    matcher: Matcher,
    lens: LensSettings,
    f_low: f64,
    snr_unlensed: f64,
}

impl LensingContext {
    pub fn new(config: &SweepConfig) -> Result<Self, LensError> {
        config.validate()?;

        let delta_f = config.delta_f();
        let full_len = config.full_len();

        let psd = config
            .noise_curve
            .build(full_len, delta_f, config.psd_low_freq_cutoff)?;

        let params = config.waveform_params();
        let native = generate_fd_waveform(&params, delta_f, config.f_low)?;
        let native_freqs = native.sample_frequencies();
        let unlensed = native.resized(full_len);

        let snr_unlensed = sigma(&unlensed, &psd, config.f_low)?;
        if !(snr_unlensed.is_finite() && snr_unlensed > 0.0) {
            return Err(LensError::ZeroNorm("unlensed waveform has zero SNR in band"));
        }

        info!(
            approximant = %params.approximant,
            psd = %config.noise_curve,
            native_len = native.len(),
            full_len,
            snr_unlensed,
            "prepared unlensed reference"
        );

        Ok(Self {
            native,
            native_freqs,
            unlensed,
            psd,
            matcher: Matcher::new(full_len, config.subsample_interpolation)?,
            lens: config.lens,
            f_low: config.f_low,
            snr_unlensed,
        })
    }

    pub fn snr_unlensed(&self) -> f64 {
        self.snr_unlensed
    }

    pub fn workspace(&self) -> MatchWorkspace {
        self.matcher.workspace()
    }

    /// SNR and mismatch of the reference waveform lensed by a point mass
    /// `ml` [M_sun, redshifted] at offset `y`.
    pub fn lensed_prediction(
        &self,
        workspace: &mut MatchWorkspace,
        ml: f64,
        y: f64,
    ) -> Result<LensedPrediction, LensError> {
        let t_m = LENS_TIME_PER_MSUN * ml;
        let transfer =
            PointMassLens::new(y)?.transfer_function(&self.native_freqs, t_m, &self.lens);
        let mut factor = transfer.values;
        remove_time_shift(&self.native_freqs, &mut factor)?;

        let lensed = self
            .native
            .multiplied_by(&factor)?
            .resized(self.unlensed.len());

        let snr_lensed = sigma(&lensed, &self.psd, self.f_low)?;
        let outcome =
            self.matcher
                .overlap_match(workspace, &lensed, &self.unlensed, &self.psd, self.f_low)?;

        Ok(LensedPrediction {
            snr_unlensed: self.snr_unlensed,
            snr_lensed,
            mismatch: outcome.mismatch(),
            geometric_from: transfer.geometric_from,
        })
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, LensError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| LensError::InvalidConfig(format!("failed to configure rayon thread pool: {err}")))
}

fn sweep_rows(
    context: &LensingContext,
    ml_grid: &[f64],
    y_grid: &[f64],
) -> Result<Vec<(Vec<GridCell>, usize)>, LensError> {
    let done = AtomicUsize::new(0);
    let total = ml_grid.len();
    let report_every = (total / 10).max(1);

    ml_grid
        .par_iter()
        .enumerate()
        .map_init(
            || context.workspace(),
            |workspace, (row_idx, &ml)| {
                let mut row = Vec::with_capacity(y_grid.len());
                let mut geometric = 0_usize;

                for &y in y_grid {
                    let prediction = context.lensed_prediction(workspace, ml, y)?;
                    if let Some(idx) = prediction.geometric_from {
                        geometric += 1;
                        if context.lens.model == LensModel::WaveOptics {
                            warn!(ml, y, freq_idx = idx, "wave optics failed, used corrected geometric optics");
                        }
                    }

                    row.push(GridCell {
                        ml,
                        y,
                        snr_ratio: prediction.snr_lensed / prediction.snr_unlensed,
                        mismatch: prediction.mismatch,
                    });
                }

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(row = row_idx, ml, geometric, "row complete");
                if finished % report_every == 0 || finished == total {
                    info!(finished, total, "lens mass rows complete");
                }

                Ok((row, geometric))
            },
        )
        .collect()
}

/// Evaluates the full `(ML, y)` grid without touching the filesystem.
pub fn run_sweep(config: &SweepConfig) -> Result<SweepResult, LensError> {
    let started = Instant::now();
    let context = LensingContext::new(config)?;
    let ml_grid = config.ml_grid();
    let y_grid = config.y_grid();

    info!(
        num_ml = ml_grid.len(),
        num_y = y_grid.len(),
        threads = ?config.threads,
        "starting lensing sweep"
    );

    let rows = match config.threads {
        Some(threads) => build_pool(threads)?.install(|| sweep_rows(&context, &ml_grid, &y_grid))?,
        None => sweep_rows(&context, &ml_grid, &y_grid)?,
    };

    let mut cells = Vec::with_capacity(ml_grid.len() * y_grid.len());
    let mut geometric_cells = 0;
    for (row, geometric) in rows {
        cells.extend(row);
        geometric_cells += geometric;
    }

    info!(
        cells = cells.len(),
        geometric_cells,
        elapsed_s = started.elapsed().as_secs_f64(),
        "lensing sweep finished"
    );

    Ok(SweepResult {
        output_dir: None,
        ml_grid,
        y_grid,
        cells,
        snr_unlensed: context.snr_unlensed(),
        geometric_cells,
    })
}

pub fn run_sweep_into_dir(config: &SweepConfig, output_dir: &Path) -> Result<SweepResult, LensError> {
    config.validate()?;
    fs::create_dir_all(output_dir)?;

    let mut result = run_sweep(config)?;

    let npz_path = output_dir.join(RESULT_NPZ);
    write_npz(
        &npz_path,
        &[
            ("psd", NpyArray::Unicode(config.noise_curve.name())),
            ("wf_params", NpyArray::vector(config.wf_params_tuple().to_vec())),
            ("tlen", NpyArray::scalar(config.tlen)),
            ("f_low", NpyArray::scalar(config.f_low)),
            ("nyquist", NpyArray::Int64(config.nyquist as i64)),
            ("ML_arr", NpyArray::vector(result.ml_grid.clone())),
            ("y_arr", NpyArray::vector(result.y_grid.clone())),
            (
                "result",
                NpyArray::Float64 {
                    shape: vec![result.ml_grid.len(), result.y_grid.len(), 4],
                    data: result.result_array(),
                },
            ),
        ],
    )?;
    info!(path = %npz_path.display(), "wrote result archive");

    if config.write_csv {
        write_grid_csv(&output_dir.join(RESULT_CSV), &result.cells)?;
    }

    let manifest = Manifest {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        created_utc: utc_now_string(),
        psd: config.noise_curve.name(),
        approximant: config.approximant.name().to_string(),
        wf_params: config.wf_params_tuple(),
        redshift: config.redshift,
        distance_mpc: config.distance_mpc,
        tlen: config.tlen,
        f_low: config.f_low,
        nyquist: config.nyquist,
        num_ml: result.ml_grid.len(),
        num_y: result.y_grid.len(),
        snr_unlensed: result.snr_unlensed,
        lens: config.lens,
        geometric_cells: result.geometric_cells,
    };
    write_manifest_json(&output_dir.join(MANIFEST_JSON), &manifest)?;

    result.output_dir = Some(output_dir.to_path_buf());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{run_sweep, LensingContext};
    use crate::config::SweepConfig;
    use crate::waveform::Approximant;
    use crate::LensError;

    fn small_config() -> SweepConfig {
        SweepConfig {
            tlen: 4.0,
            nyquist: 1024,
            f_low: 20.0,
            psd_low_freq_cutoff: 15.0,
            approximant: Approximant::TaylorF2,
            ml_min: 1.0,
            ml_max: 100.0,
            num_ml: 3,
            y_min: 0.3,
            y_max: 3.0,
            num_y: 2,
            threads: Some(2),
            ..SweepConfig::default()
        }
    }

    #[test]
    fn negligible_lens_mass_leaves_the_signal_unchanged() {
        let config = small_config();
        let context = LensingContext::new(&config).unwrap();
        let mut workspace = context.workspace();

        let prediction = context.lensed_prediction(&mut workspace, 1e-6, 1.0).unwrap();
        assert_relative_eq!(prediction.snr_lensed / prediction.snr_unlensed, 1.0, epsilon = 1e-4);
        assert!(prediction.mismatch.abs() < 1e-6, "mismatch {}", prediction.mismatch);
    }

    #[test]
    fn noise_curve_silent_over_the_signal_band_is_an_error() {
        // The inspiral ends near 220 Hz, below the first non-zero PSD bin.
        let config = SweepConfig {
            psd_low_freq_cutoff: 600.0,
            ..small_config()
        };
        let err = LensingContext::new(&config).err().unwrap();
        assert!(matches!(err, LensError::ZeroNorm(_)), "{err}");
        assert!(run_sweep(&config).is_err());
    }

    #[test]
    fn empty_grid_is_rejected() {
        let config = SweepConfig {
            num_y: 0,
            ..small_config()
        };
        assert!(matches!(run_sweep(&config), Err(LensError::InvalidConfig(_))));
    }

    #[test]
    fn grid_cells_are_physical_and_ordered() {
        let config = small_config();
        let result = run_sweep(&config).unwrap();

        assert_eq!(result.cells.len(), 6);
        assert_eq!(result.result_array().len(), 24);
        for (idx, cell) in result.cells.iter().enumerate() {
            assert_eq!(cell.ml, result.ml_grid[idx / 2]);
            assert_eq!(cell.y, result.y_grid[idx % 2]);
            assert!(cell.snr_ratio > 0.0);
            assert!(cell.mismatch > -1e-9 && cell.mismatch <= 1.0);
        }
        assert!(result.cell(3, 0).is_none());
    }

    #[test]
    fn close_alignment_magnifies_more() {
        let config = small_config();
        let context = LensingContext::new(&config).unwrap();
        let mut workspace = context.workspace();

        let near = context.lensed_prediction(&mut workspace, 100.0, 0.1).unwrap();
        let far = context.lensed_prediction(&mut workspace, 100.0, 5.0).unwrap();
        assert!(near.snr_lensed > far.snr_lensed);
        assert!(far.snr_lensed / far.snr_unlensed > 0.9);
    }

    #[test]
    fn sweep_is_reproducible_across_thread_counts() {
        let mut config = small_config();
        let parallel = run_sweep(&config).unwrap();
        config.threads = Some(1);
        let serial = run_sweep(&config).unwrap();
        assert_eq!(parallel.cells, serial.cells);
    }
}
