use std::time::Instant;

use colorgrid_core::{coverage_percent, BgrImage, BgrImageView, Homography};
use image::imageops::{resize, FilterType};
use image::{GrayImage, RgbImage};
use log::debug;
use nalgebra::Point2;
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::colorfulness::{ColorfulnessFallback, ColorfulnessReport};
use crate::error::DetectError;
use crate::grid::{check_cells, check_seams, grid_decision, CellsReport, Seams};
use crate::params::DetectorParams;
use crate::quad::find_quad;
use crate::refine::{refine_boundary, WarpedBox};
use crate::segment::{mask_fraction, segment};
use crate::warp::warp_to_square;

/// Intermediate measurements behind a detection.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionDiagnostics {
    /// Quadrilateral extracted from the outer mask (original image coordinates).
    pub quad: [Point2<f32>; 4],
    /// Working image coordinates to warped square coordinates.
    pub homography: Homography,
    pub seams: Seams,
    pub cells: CellsReport,
    pub colorfulness: ColorfulnessReport,
    /// `true` when the warped mask was too sparse and was recomputed with relaxed floors.
    pub warp_relaxed: bool,
    /// Refined box in warped coordinates.
    pub warped_box: WarpedBox,
    /// Downscale factor applied before detection (1.0 when none).
    pub scale: f32,
}

/// Marker found in an image.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionResult {
    /// Refined boundary, clockwise from the top-left, in original image coordinates.
    pub polygon: Vec<Point2<f32>>,
    /// Polygon area relative to the image area, `[0, 100]`.
    pub coverage_percent: f64,
    pub grid_ok: bool,
    pub diagnostics: DetectionDiagnostics,
}

/// Intermediate images of one detection call, for debugging.
///
/// Masks and the warped image are at working resolution (after `max_side`);
/// `quad` and `polygon` are in original image coordinates.
#[derive(Clone, Debug, Default)]
pub struct DetectionTrace {
    pub mask: Option<GrayImage>,
    pub quad: Option<[Point2<f32>; 4]>,
    pub warped: Option<BgrImage>,
    pub warped_mask: Option<GrayImage>,
    pub polygon: Option<Vec<Point2<f32>>>,
}

/// 3x3 color-grid marker detector.
pub struct MarkerDetector {
    params: DetectorParams,
    colorfulness: ColorfulnessFallback,
}

fn scaled_copy(image: &BgrImageView<'_>, scale: f32) -> Option<BgrImage> {
    let buf = RgbImage::from_raw(image.width as u32, image.height as u32, image.data.to_vec())?;
    let w = ((image.width as f32 * scale).round() as u32).max(1);
    let h = ((image.height as f32 * scale).round() as u32).max(1);
    let small = resize(&buf, w, h, FilterType::Triangle);
    Some(BgrImage {
        width: w as usize,
        height: h as usize,
        data: small.into_raw(),
    })
}

impl MarkerDetector {
    pub fn new(params: DetectorParams) -> Self {
        let colorfulness = ColorfulnessFallback::new(params.colorfulness);
        Self {
            params,
            colorfulness,
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect the marker. `Ok(None)` means no marker was found.
    pub fn detect(&self, image: &BgrImageView<'_>) -> Result<Option<DetectionResult>, DetectError> {
        self.run(image, None)
    }

    /// Like [`Self::detect`], also returning the intermediate images.
    pub fn detect_traced(
        &self,
        image: &BgrImageView<'_>,
    ) -> Result<(Option<DetectionResult>, DetectionTrace), DetectError> {
        let mut trace = DetectionTrace::default();
        let result = self.run(image, Some(&mut trace))?;
        Ok((result, trace))
    }

    fn working_scale(&self, image: &BgrImageView<'_>) -> f32 {
        match self.params.max_side {
            Some(max_side) if max_side > 0 => {
                let longest = image.width.max(image.height) as f32;
                if longest > max_side as f32 {
                    max_side as f32 / longest
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = image.width, height = image.height))
    )]
    fn run(
        &self,
        image: &BgrImageView<'_>,
        mut trace: Option<&mut DetectionTrace>,
    ) -> Result<Option<DetectionResult>, DetectError> {
        image.validate()?;
        let started = Instant::now();
        let params = &self.params;

        let mut scale = self.working_scale(image);
        let resized = if scale < 1.0 {
            scaled_copy(image, scale)
        } else {
            None
        };
        let view = match &resized {
            Some(img) => {
                debug!(
                    "downscaled {}x{} -> {}x{}",
                    image.width, image.height, img.width, img.height
                );
                img.view()
            }
            None => {
                scale = 1.0;
                *image
            }
        };

        let inv_scale = 1.0 / scale;
        let to_original = |p: Point2<f32>| p * inv_scale;

        let mask = segment(&view, &params.segmentation)?;
        let quad = find_quad(&mask);
        if let Some(t) = trace.as_deref_mut() {
            t.mask = Some(mask);
            t.quad = quad.map(|q| q.map(to_original));
        }
        let Some(quad) = quad else {
            debug!("no marker-colored region found");
            return Ok(None);
        };

        let n = params.effective_warp_size();
        let warp = warp_to_square(&view, &quad, n)?;

        let mut warped_mask = segment(&warp.image.view(), &params.segmentation)?;
        let mut warp_relaxed = false;
        let warped_fraction = mask_fraction(&warped_mask);
        if warped_fraction < params.warp_relax.min_fraction {
            debug!(
                "warped mask too sparse ({:.2}%), relaxing once",
                warped_fraction * 100.0
            );
            let relaxed = params.warp_relax.relax(&params.segmentation);
            warped_mask = segment(&warp.image.view(), &relaxed)?;
            warp_relaxed = true;
        }

        let seams = check_seams(&warped_mask);
        let cells = check_cells(&warped_mask, params.min_cell_fraction);
        let colorfulness = self.colorfulness.evaluate(&warp.image);
        let grid_ok = grid_decision(params.strict, seams.ok, cells.ok, colorfulness.ok);

        let (warped_box, polygon) = refine_boundary(&warped_mask, &warp.h_inv, &params.refine);
        let polygon: Vec<Point2<f32>> = polygon.into_iter().map(to_original).collect();
        let quad = quad.map(to_original);
        if let Some(t) = trace.as_deref_mut() {
            t.polygon = Some(polygon.clone());
            t.warped = Some(warp.image);
            t.warped_mask = Some(warped_mask);
        }

        let coverage = coverage_percent(&polygon, image.width, image.height);
        debug!(
            "coverage {:.2}%, grid_ok={} (seams={}, cells={}, colorful={}), {:.1} ms",
            coverage,
            grid_ok,
            seams.ok,
            cells.ok,
            colorfulness.ok,
            started.elapsed().as_secs_f64() * 1000.0
        );

        if coverage < params.min_coverage_percent {
            debug!("rejected: coverage below {}%", params.min_coverage_percent);
            return Ok(None);
        }
        if params.strict && !grid_ok {
            debug!("rejected: grid check failed in strict mode");
            return Ok(None);
        }

        Ok(Some(DetectionResult {
            polygon,
            coverage_percent: coverage,
            grid_ok,
            diagnostics: DetectionDiagnostics {
                quad,
                homography: warp.h,
                seams,
                cells,
                colorfulness,
                warp_relaxed,
                warped_box,
                scale,
            },
        }))
    }
}
