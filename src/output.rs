use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::lens::LensSettings;
use crate::sweep::GridCell;
use crate::LensError;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";
pub const RESULT_NPZ: &str = "grid_result.npz";
pub const RESULT_CSV: &str = "grid_result.csv";
pub const MANIFEST_JSON: &str = "manifest.json";

/// Metadata stored next to every result grid.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub created_utc: String,
    pub psd: String,
    pub approximant: String,
    /// Source-frame `(m1, m2, s1z, s2z)`
    pub wf_params: [f64; 4],
    pub redshift: f64,
    pub distance_mpc: f64,
    pub tlen: f64,
    pub f_low: f64,
    pub nyquist: usize,
    pub num_ml: usize,
    pub num_y: usize,
    pub snr_unlensed: f64,
    pub lens: LensSettings,
    /// Cells whose transfer function fell back to geometric optics
    pub geometric_cells: usize,
}

pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf, LensError> {
    fs::create_dir_all(output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

pub fn utc_now_string() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<(), LensError> {
    if expected == actual {
        return Ok(());
    }

    Err(LensError::LengthMismatch {
        context,
        expected,
        got: actual,
    })
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10e}")
}

/// Long-format table, one row per grid cell in row-major order.
pub fn write_grid_csv(path: &Path, cells: &[GridCell]) -> Result<(), LensError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["ml", "y", "snr_ratio", "mismatch"])?;

    for cell in cells {
        writer.write_record([
            fmt_f64(cell.ml),
            fmt_f64(cell.y),
            fmt_f64(cell.snr_ratio),
            fmt_f64(cell.mismatch),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_manifest_json(path: &Path, manifest: &Manifest) -> Result<(), LensError> {
    let payload = serde_json::to_string_pretty(manifest)?;
    fs::write(path, payload)?;
    Ok(())
}

/// One entry of a NumPy `.npz` archive.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    /// `<f8` array in C order; an empty shape is a scalar
    Float64 { shape: Vec<usize>, data: Vec<f64> },
    /// `<i8` scalar
    Int64(i64),
    /// `<U` scalar string
    Unicode(String),
}

impl NpyArray {
    pub fn scalar(value: f64) -> Self {
        Self::Float64 {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self::Float64 {
            shape: vec![data.len()],
            data,
        }
    }

    fn descr_and_shape(&self) -> (String, &[usize]) {
        match self {
            Self::Float64 { shape, .. } => ("<f8".to_string(), shape.as_slice()),
            Self::Int64(_) => ("<i8".to_string(), &[]),
            Self::Unicode(text) => (format!("<U{}", text.chars().count().max(1)), &[]),
        }
    }

    fn validate(&self) -> Result<(), LensError> {
        if let Self::Float64 { shape, data } = self {
            ensure_len("npy data", shape.iter().product(), data.len())?;
        }
        Ok(())
    }

    /// Serialized `.npy` file, format version 1.0.
    pub fn to_npy_bytes(&self) -> Result<Vec<u8>, LensError> {
        self.validate()?;

        let (descr, shape) = self.descr_and_shape();
        let shape_text = match shape {
            [] => "()".to_string(),
            [single] => format!("({single},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        let mut header =
            format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape_text}, }}");
        // magic (6) + version (2) + header length (2) + header, newline-terminated
        let unpadded = 10 + header.len() + 1;
        let padding = (64 - unpadded % 64) % 64;
        header.extend(std::iter::repeat(' ').take(padding));
        header.push('\n');

        let header_len = u16::try_from(header.len()).map_err(|_| {
            LensError::InvalidConfig(format!("npy header too long: {} bytes", header.len()))
        })?;

        let mut bytes = Vec::with_capacity(10 + header.len() + self.payload_len());
        bytes.extend_from_slice(b"\x93NUMPY");
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&header_len.to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());

        match self {
            Self::Float64 { data, .. } => {
                for value in data {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::Int64(value) => bytes.extend_from_slice(&value.to_le_bytes()),
            Self::Unicode(text) => {
                for ch in text.chars() {
                    bytes.extend_from_slice(&u32::from(ch).to_le_bytes());
                }
                if text.is_empty() {
                    bytes.extend_from_slice(&0_u32.to_le_bytes());
                }
            }
        }

        Ok(bytes)
    }

    fn payload_len(&self) -> usize {
        match self {
            Self::Float64 { data, .. } => 8 * data.len(),
            Self::Int64(_) => 8,
            Self::Unicode(text) => 4 * text.chars().count().max(1),
        }
    }
}

/// Uncompressed NumPy archive readable by `numpy.load`.
pub fn write_npz(path: &Path, entries: &[(&str, NpyArray)]) -> Result<(), LensError> {
    let file = BufWriter::new(File::create(path)?);
    let mut archive = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (key, array) in entries {
        let bytes = array.to_npy_bytes()?;
        archive.start_file(format!("{key}.npy"), options)?;
        archive.write_all(&bytes)?;
    }

    let mut inner = archive.finish()?;
    inner.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::{create_timestamped_output_dir, write_grid_csv, write_npz, NpyArray};
    use crate::sweep::GridCell;

    #[test]
    fn npy_header_is_aligned_and_describes_the_array() {
        let array = NpyArray::Float64 {
            shape: vec![2, 3, 4],
            data: vec![0.5; 24],
        };
        let bytes = array.to_npy_bytes().unwrap();

        assert_eq!(&bytes[..6], b"\x93NUMPY");
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'descr': '<f8'"));
        assert!(header.contains("'shape': (2, 3, 4)"));
        assert!(header.ends_with('\n'));
        assert_eq!(bytes.len(), 10 + header_len + 24 * 8);

        let first = f64::from_le_bytes(bytes[10 + header_len..18 + header_len].try_into().unwrap());
        assert_eq!(first, 0.5);
    }

    #[test]
    fn scalar_and_string_entries() {
        let scalar = NpyArray::scalar(16.0).to_npy_bytes().unwrap();
        let header_len = u16::from_le_bytes([scalar[8], scalar[9]]) as usize;
        assert!(std::str::from_utf8(&scalar[10..10 + header_len])
            .unwrap()
            .contains("'shape': ()"));

        let text = NpyArray::Unicode("ET".to_string()).to_npy_bytes().unwrap();
        let header_len = u16::from_le_bytes([text[8], text[9]]) as usize;
        let header = std::str::from_utf8(&text[10..10 + header_len]).unwrap();
        assert!(header.contains("'<U2'"));
        assert_eq!(&text[10 + header_len..], &[b'E', 0, 0, 0, b'T', 0, 0, 0]);
    }

    #[test]
    fn shape_and_data_must_agree() {
        let array = NpyArray::Float64 {
            shape: vec![3],
            data: vec![1.0, 2.0],
        };
        assert!(array.to_npy_bytes().is_err());
    }

    #[test]
    fn npz_contains_one_member_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.npz");
        write_npz(
            &path,
            &[
                ("tlen", NpyArray::scalar(16.0)),
                ("nyquist", NpyArray::Int64(2048)),
                ("y_arr", NpyArray::vector(vec![0.1, 1.0])),
            ],
        )
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);

        let mut member = archive.by_name("nyquist.npy").unwrap();
        let mut raw = Vec::new();
        member.read_to_end(&mut raw).unwrap();
        let tail: [u8; 8] = raw[raw.len() - 8..].try_into().unwrap();
        assert_eq!(i64::from_le_bytes(tail), 2048);
    }

    #[test]
    fn csv_has_header_and_one_row_per_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.csv");
        let cells = [
            GridCell {
                ml: 1.0,
                y: 0.1,
                snr_ratio: 1.5,
                mismatch: 0.01,
            },
            GridCell {
                ml: 1.0,
                y: 1.0,
                snr_ratio: 1.1,
                mismatch: 0.001,
            },
        ];
        write_grid_csv(&path, &cells).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ml,y,snr_ratio,mismatch");
    }

    #[test]
    fn timestamped_dirs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(root.path()).unwrap();
        let second = create_timestamped_output_dir(root.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }
}
