//! colorgrid CLI: detect 3x3 color-grid markers and print their image coverage.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colorgrid::marker::{DetectionResult, DetectorParams, MarkerDetector};
use colorgrid::{detect_path, DebugDump};
use log::warn;
use serde::Serialize;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "colorgrid")]
#[command(about = "Detect 3x3 color-grid markers; prints \"<path> <coverage>%\" per image")]
#[command(version)]
struct Cli {
    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,

    /// Write intermediate masks and overlays into this directory.
    #[arg(long, value_name = "DIR")]
    save_debug: Option<PathBuf>,

    /// Require both seams and cells to validate the grid.
    #[arg(long, conflicts_with = "loose")]
    strict: bool,

    /// Accept the grid on cells or on the colorfulness fallback (default).
    #[arg(long)]
    loose: bool,

    /// Minimum allowed-color fraction per grid cell, in [0, 1].
    #[arg(long, value_name = "F")]
    grid_threshold: Option<f64>,

    /// Side of the canonical warped square (at least 32).
    #[arg(long, value_name = "N")]
    warp_size: Option<usize>,

    /// Downscale images whose larger side exceeds this many pixels.
    #[arg(long, value_name = "PX")]
    max_side: Option<u32>,

    /// JSON file with detector parameters; flags override its values.
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Write per-image results as pretty JSON.
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// Input images.
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ImageReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    detection: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_logging(debug: bool) {
    #[cfg(feature = "tracing")]
    {
        // RUST_LOG drives verbosity here; `--debug` only applies to the plain logger.
        let _ = debug;
        let _ = tracing_log::LogTracer::init();
        colorgrid::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = colorgrid::core::init_with_level(colorgrid::core::level_for_verbosity(debug));
    }
}

fn load_params(cli: &Cli) -> CliResult<DetectorParams> {
    let mut params = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
            serde_json::from_str::<DetectorParams>(&text)
                .map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => DetectorParams::default(),
    };
    if cli.strict {
        params.strict = true;
    }
    if cli.loose {
        params.strict = false;
    }
    if let Some(t) = cli.grid_threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("--grid-threshold must be in [0, 1], got {t}").into());
        }
        params.min_cell_fraction = t;
    }
    if let Some(n) = cli.warp_size {
        params.warp_size = n;
    }
    if let Some(px) = cli.max_side {
        params.max_side = Some(px);
    }
    Ok(params)
}

fn write_report(path: &Path, reports: &[ImageReport]) -> CliResult<()> {
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let params = match load_params(&cli) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    let detector = MarkerDetector::new(params);
    let dump = cli.save_debug.as_ref().map(DebugDump::new);

    let mut failed = 0usize;
    let mut reports = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        let (detection, error) = match detect_path(path, &detector, dump.as_ref()) {
            Ok(Some(found)) => {
                println!("{} {}%", path.display(), found.coverage_percent.round() as i64);
                (Some(found), None)
            }
            Ok(None) => {
                warn!("{}: no marker detected", path.display());
                failed += 1;
                (None, Some("no marker detected".to_string()))
            }
            Err(err) => {
                warn!("{}: {err}", path.display());
                failed += 1;
                (None, Some(err.to_string()))
            }
        };
        reports.push(ImageReport {
            path: path.clone(),
            detection,
            error,
        });
    }

    if let Some(report_path) = &cli.report {
        if let Err(err) = write_report(report_path, &reports) {
            warn!("cannot write report {}: {err}", report_path.display());
            failed += 1;
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
