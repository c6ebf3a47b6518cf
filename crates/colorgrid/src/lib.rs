//! Color-grid marker detection: library facade and command-line tool.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`colorgrid::core`, `colorgrid::marker`),
//! - image loading into the BGR layout the detector works on,
//! - file-level detection helpers and a best-effort debug artifact writer,
//! - (feature `cli`) the `colorgrid` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use colorgrid::marker::{DetectorParams, MarkerDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = colorgrid::load_bgr("scene.jpg")?;
//! let detector = MarkerDetector::new(DetectorParams::default());
//! match detector.detect(&img.view())? {
//!     Some(found) => println!("{:.0}%", found.coverage_percent),
//!     None => println!("no marker"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `colorgrid::core`: BGR image views, homographies, polygon utilities, logging setup.
//! - `colorgrid::marker`: segmentation, quad extraction, grid validation, the detector.
//! - [`load_bgr`], [`detect_path`]: end-to-end helpers working on files.
//! - [`DebugDump`]: writes intermediate masks and overlays as PNG files.

pub use colorgrid_core as core;
pub use colorgrid_marker as marker;

mod debug_dump;
mod detect;

pub use debug_dump::{DebugDump, DumpSummary};
pub use detect::{bgr_from_rgb, detect_path, load_bgr, rgb_from_bgr, LoadError, PipelineError};
