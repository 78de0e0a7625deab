use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gw_lens_mismatch::{create_timestamped_output_dir, run_sweep_into_dir, SweepConfig};

#[derive(Debug, Parser)]
#[command(name = "gw_lens_sweep")]
#[command(about = "SNR ratio and mismatch of point-mass lensed compact-binary signals")]
#[command(version)]
struct Cli {
    /// JSON configuration; defaults to ./config.json when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for timestamped run directories
    #[arg(long)]
    outdir: Option<PathBuf>,

    #[arg(long)]
    num_ml: Option<usize>,

    #[arg(long)]
    num_y: Option<usize>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Skip grid_result.csv
    #[arg(long, default_value_t = false)]
    no_csv: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    if let Err(error) = try_main(cli) {
        eprintln!("gw-lens sweep failed: {error:#}");
        std::process::exit(1);
    }
}

fn try_main(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    if let Some(outdir) = cli.outdir {
        config.output_root = outdir;
    }
    if let Some(num_ml) = cli.num_ml {
        config.num_ml = num_ml;
    }
    if let Some(num_y) = cli.num_y {
        config.num_y = num_y;
    }
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }
    if cli.no_csv {
        config.write_csv = false;
    }

    config.validate().context("invalid sweep configuration")?;

    let output_dir = create_timestamped_output_dir(&config.output_root).with_context(|| {
        format!(
            "failed to create output directory under {}",
            config.output_root.display()
        )
    })?;
    info!(path = %output_dir.display(), "created run directory");

    let result = run_sweep_into_dir(&config, &output_dir).context("lensing sweep failed")?;

    println!("SNR (unlensed): {:.4}", result.snr_unlensed);
    println!("Output directory: {}", output_dir.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    if let Some(path) = path {
        return load_config_file(path);
    }

    let cwd_config = PathBuf::from("config.json");
    if cwd_config.exists() {
        return load_config_file(&cwd_config);
    }

    Ok(SweepConfig::default())
}

fn load_config_file(path: &Path) -> Result<SweepConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: SweepConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}
