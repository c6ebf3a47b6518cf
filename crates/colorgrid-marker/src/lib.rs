//! 3x3 color-grid marker detector.
//!
//! Pipeline:
//! - segment the six marker colors in HSV (CLAHE on V, white-rim suppression,
//!   sparse-mask recovery) into a binary mask,
//! - take the largest region and fit a quadrilateral,
//! - warp the image to an `N x N` square and re-segment it,
//! - validate the 3x3 grid (seams, per-cell coverage, colorfulness fallback),
//! - tighten the box in warped space and map it back to the image.
//!
//! A marker that is not present yields `Ok(None)`; only malformed input is an error.
//!
//! ```no_run
//! use colorgrid_core::BgrImage;
//! use colorgrid_marker::{DetectorParams, MarkerDetector};
//!
//! let img = BgrImage::filled(640, 480, [0, 0, 0]);
//! let detector = MarkerDetector::new(DetectorParams::default());
//! if let Some(found) = detector.detect(&img.view())? {
//!     println!("{:.1}% grid_ok={}", found.coverage_percent, found.grid_ok);
//! }
//! # Ok::<(), colorgrid_marker::DetectError>(())
//! ```

mod colorfulness;
mod detector;
mod error;
mod grid;
mod hsv;
mod params;
mod quad;
mod refine;
mod rim;
mod segment;
mod warp;

pub use colorfulness::{ColorfulnessFallback, ColorfulnessParams, ColorfulnessReport};
pub use detector::{DetectionDiagnostics, DetectionResult, DetectionTrace, MarkerDetector};
pub use error::DetectError;
pub use grid::{cell_bounds, check_cells, check_seams, grid_decision, CellsReport, Seams};
pub use hsv::{bgr_to_hsv8, clahe, ClaheParams, HsvPlanes};
pub use params::{
    DetectorParams, SegmentationParams, SparseRecoveryParams, WarpRelaxParams, MIN_WARP_SIZE,
};
pub use quad::find_quad;
pub use refine::{refine_boundary, tight_box, RefineParams, WarpedBox};
pub use rim::{RimOutcome, WhiteRimParams, WhiteRimSuppressor};
pub use segment::{
    clean_mask, mask_fraction, segment, HueInterval, MarkerColor, ALLOWED_COLORS,
};
pub use warp::{square_corners, warp_to_square, WarpResult};
