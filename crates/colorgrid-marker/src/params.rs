use serde::{Deserialize, Serialize};

use crate::colorfulness::ColorfulnessParams;
use crate::hsv::ClaheParams;
use crate::refine::RefineParams;
use crate::rim::WhiteRimParams;

/// Smallest canonical warp size accepted by the detector.
pub const MIN_WARP_SIZE: usize = 32;

/// Sparse-mask recovery: relax the S/V floors when almost nothing was segmented.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseRecoveryParams {
    /// Mask fraction below which the floors are relaxed.
    pub min_fraction: f64,
    /// Amount subtracted from the effective S/V floors per attempt.
    pub step: u8,
    pub max_attempts: u32,
    /// Effective saturation floor never drops below this.
    pub s_min: u8,
    /// Effective value floor never drops below this.
    pub v_min: u8,
}

impl Default for SparseRecoveryParams {
    fn default() -> Self {
        Self {
            min_fraction: 0.001,
            step: 20,
            max_attempts: 2,
            s_min: 35,
            v_min: 35,
        }
    }
}

/// Parameters of the allowed-color segmenter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Gaussian pre-blur kernel size: 0 disables it, otherwise odd and >= 3.
    pub blur_ksize: u32,
    /// Morphological opening iterations (3x3 square element).
    pub open_iter: u32,
    /// Morphological closing iterations (3x3 square element).
    pub close_iter: u32,
    /// Global saturation floor; raises every interval's own floor.
    pub s_floor: u8,
    /// Global value floor; raises every interval's own floor.
    pub v_floor: u8,
    /// Extra amount subtracted from the effective floors (used by relaxations).
    pub floor_relax: u8,
    pub clahe: ClaheParams,
    pub rim: WhiteRimParams,
    pub sparse: SparseRecoveryParams,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            blur_ksize: 3,
            open_iter: 1,
            close_iter: 2,
            s_floor: 90,
            v_floor: 80,
            floor_relax: 0,
            clahe: ClaheParams::default(),
            rim: WhiteRimParams::default(),
            sparse: SparseRecoveryParams::default(),
        }
    }
}

impl SegmentationParams {
    /// Effective blur kernel size, or `None` when blurring is disabled.
    pub fn blur_kernel(&self) -> Option<u32> {
        (self.blur_ksize >= 3 && self.blur_ksize % 2 == 1).then_some(self.blur_ksize)
    }
}

/// One-shot relaxation applied to the warped view when its mask is too sparse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpRelaxParams {
    /// Warped mask fraction below which the relaxation runs.
    pub min_fraction: f64,
    /// Amount subtracted from the global S/V floors.
    pub floor_drop: u8,
    /// Amount added to `floor_relax`.
    pub extra_relax: u8,
    /// Closing iterations added on top of the configured ones.
    pub extra_close_iter: u32,
}

impl Default for WarpRelaxParams {
    fn default() -> Self {
        Self {
            min_fraction: 0.03,
            floor_drop: 25,
            extra_relax: 20,
            extra_close_iter: 1,
        }
    }
}

impl WarpRelaxParams {
    /// Segmentation parameters for the relaxed warped pass.
    pub fn relax(&self, base: &SegmentationParams) -> SegmentationParams {
        SegmentationParams {
            s_floor: base.s_floor.saturating_sub(self.floor_drop),
            v_floor: base.v_floor.saturating_sub(self.floor_drop),
            floor_relax: base.floor_relax.saturating_add(self.extra_relax),
            close_iter: base.close_iter + self.extra_close_iter,
            ..*base
        }
    }
}

/// Parameters of the marker detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Strict mode requires seams AND cells; relaxed mode accepts cells OR colorfulness.
    pub strict: bool,
    /// Minimum allowed-color fraction per grid cell.
    pub min_cell_fraction: f64,
    /// Side of the canonical warped square (clamped to at least 32).
    pub warp_size: usize,
    /// Downscale inputs whose larger side exceeds this many pixels.
    pub max_side: Option<u32>,
    /// Detections whose polygon covers less than this percentage are rejected.
    pub min_coverage_percent: f64,
    pub segmentation: SegmentationParams,
    pub warp_relax: WarpRelaxParams,
    pub colorfulness: ColorfulnessParams,
    pub refine: RefineParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            strict: false,
            min_cell_fraction: 0.2,
            warp_size: 300,
            max_side: None,
            min_coverage_percent: 0.5,
            segmentation: SegmentationParams::default(),
            warp_relax: WarpRelaxParams::default(),
            colorfulness: ColorfulnessParams::default(),
            refine: RefineParams::default(),
        }
    }
}

impl DetectorParams {
    pub fn effective_warp_size(&self) -> usize {
        self.warp_size.max(MIN_WARP_SIZE)
    }
}
