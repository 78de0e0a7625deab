use std::fs::File;
use std::io::Read;

use gw_lens_mismatch::output::{MANIFEST_JSON, RESULT_CSV, RESULT_NPZ};
use gw_lens_mismatch::{run_default_sweep, Approximant, LensError, NoiseCurve, SweepConfig};

fn member_bytes(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
    let mut member = archive.by_name(name).unwrap();
    let mut raw = Vec::new();
    member.read_to_end(&mut raw).unwrap();
    raw
}

fn npy_payload(raw: &[u8]) -> &[u8] {
    let header_len = u16::from_le_bytes([raw[8], raw[9]]) as usize;
    &raw[10 + header_len..]
}

#[test]
fn sweep_writes_archive_table_and_manifest() {
    let root = tempfile::tempdir().unwrap();
    let config = SweepConfig {
        tlen: 4.0,
        nyquist: 512,
        f_low: 20.0,
        psd_low_freq_cutoff: 10.0,
        approximant: Approximant::TaylorF2,
        noise_curve: NoiseCurve::AdvancedLigo,
        ml_min: 0.1,
        ml_max: 1000.0,
        num_ml: 4,
        y_min: 0.1,
        y_max: 10.0,
        num_y: 3,
        threads: Some(2),
        output_root: root.path().join("runs"),
        ..SweepConfig::default()
    };

    let result = run_default_sweep(&config).unwrap();
    let output_dir = result.output_dir.clone().unwrap();
    assert!(output_dir.starts_with(root.path()));

    assert_eq!(result.cells.len(), 12);
    for cell in &result.cells {
        assert!(cell.snr_ratio.is_finite() && cell.snr_ratio > 0.0);
        assert!(cell.mismatch > -1e-9 && cell.mismatch <= 1.0);
    }

    // The lightest lens barely perturbs the signal.
    let light = result.cell(0, 2).unwrap();
    assert!((light.snr_ratio - 1.0).abs() < 1e-2);
    assert!(light.mismatch < 1e-3);

    let mut archive = zip::ZipArchive::new(File::open(output_dir.join(RESULT_NPZ)).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "ML_arr.npy",
            "f_low.npy",
            "nyquist.npy",
            "psd.npy",
            "result.npy",
            "tlen.npy",
            "wf_params.npy",
            "y_arr.npy",
        ]
    );

    let raw = member_bytes(&mut archive, "result.npy");
    let payload = npy_payload(&raw);
    assert_eq!(payload.len(), 12 * 4 * 8);
    let last_mismatch = f64::from_le_bytes(payload[payload.len() - 8..].try_into().unwrap());
    assert_eq!(last_mismatch, result.cells[11].mismatch);

    let raw = member_bytes(&mut archive, "wf_params.npy");
    let first_mass = f64::from_le_bytes(npy_payload(&raw)[..8].try_into().unwrap());
    assert_eq!(first_mass, 10.0);

    let csv = std::fs::read_to_string(output_dir.join(RESULT_CSV)).unwrap();
    assert_eq!(csv.lines().count(), 13);

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join(MANIFEST_JSON)).unwrap())
            .unwrap();
    assert_eq!(manifest["psd"], "aLIGOZeroDetHighPower");
    assert_eq!(manifest["num_ml"], 4);
    assert_eq!(manifest["approximant"], "TaylorF2");
}

#[test]
fn invalid_grid_is_rejected_before_any_output() {
    let root = tempfile::tempdir().unwrap();
    let output_root = root.path().join("runs");
    let config = SweepConfig {
        ml_min: 10.0,
        ml_max: 1.0,
        output_root: output_root.clone(),
        ..SweepConfig::default()
    };

    let err = run_default_sweep(&config).unwrap_err();
    assert!(matches!(err, LensError::InvalidConfig(_)), "{err}");
    assert!(!output_root.exists());
}
