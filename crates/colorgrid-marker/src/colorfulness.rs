//! Colorfulness fallback: a photometric check on the warped color image that
//! does not depend on the mask.

use colorgrid_core::BgrImage;
use serde::{Deserialize, Serialize};

use crate::grid::cell_bounds;
use crate::hsv::bgr_to_hsv8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorfulnessParams {
    pub min_mean_saturation: f64,
    pub min_mean_value: f64,
    /// Number of qualifying cells (out of 9) required to pass.
    pub min_cells: usize,
}

impl Default for ColorfulnessParams {
    fn default() -> Self {
        Self {
            min_mean_saturation: 70.0,
            min_mean_value: 60.0,
            min_cells: 7,
        }
    }
}

/// Mean 8-bit saturation/value per cell, indexed `[row][col]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ColorfulnessReport {
    pub mean_saturation: [[f64; 3]; 3],
    pub mean_value: [[f64; 3]; 3],
    pub qualifying_cells: usize,
    pub ok: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorfulnessFallback {
    params: ColorfulnessParams,
}

impl ColorfulnessFallback {
    pub fn new(params: ColorfulnessParams) -> Self {
        Self { params }
    }

    pub fn evaluate(&self, warped: &BgrImage) -> ColorfulnessReport {
        if warped.width == 0 || warped.height == 0 {
            return ColorfulnessReport::default();
        }
        let xs = cell_bounds(warped.width);
        let ys = cell_bounds(warped.height);

        let mut report = ColorfulnessReport::default();
        for (r, &(y0, y1)) in ys.iter().enumerate() {
            for (c, &(x0, x1)) in xs.iter().enumerate() {
                let count = (y1 - y0) * (x1 - x0);
                if count == 0 {
                    continue;
                }
                let (mut s_sum, mut v_sum) = (0u64, 0u64);
                for y in y0..y1 {
                    for x in x0..x1 {
                        let [_, s, v] = bgr_to_hsv8(warped.pixel(x, y));
                        s_sum += s as u64;
                        v_sum += v as u64;
                    }
                }
                let s_mean = s_sum as f64 / count as f64;
                let v_mean = v_sum as f64 / count as f64;
                report.mean_saturation[r][c] = s_mean;
                report.mean_value[r][c] = v_mean;
                if s_mean >= self.params.min_mean_saturation
                    && v_mean >= self.params.min_mean_value
                {
                    report.qualifying_cells += 1;
                }
            }
        }
        report.ok = report.qualifying_cells >= self.params.min_cells;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painted(cells: &[[u8; 3]; 9], cell: usize) -> BgrImage {
        let mut img = BgrImage::filled(3 * cell, 3 * cell, [0, 0, 0]);
        for (i, bgr) in cells.iter().enumerate() {
            img.fill_rect((i % 3) * cell, (i / 3) * cell, cell, cell, *bgr);
        }
        img
    }

    const R: [u8; 3] = [0, 0, 255];
    const G: [u8; 3] = [0, 255, 0];
    const B: [u8; 3] = [255, 0, 0];
    const K: [u8; 3] = [0, 0, 0];
    const W: [u8; 3] = [255, 255, 255];

    #[test]
    fn colorful_grid_passes() {
        let img = painted(&[R, G, B, G, B, R, B, R, G], 20);
        let rep = ColorfulnessFallback::new(ColorfulnessParams::default()).evaluate(&img);
        assert_eq!(rep.qualifying_cells, 9);
        assert!(rep.ok);
    }

    #[test]
    fn two_dull_cells_still_pass() {
        let img = painted(&[R, G, B, G, K, R, B, W, G], 20);
        let rep = ColorfulnessFallback::new(ColorfulnessParams::default()).evaluate(&img);
        assert_eq!(rep.qualifying_cells, 7);
        assert!(rep.ok);
    }

    #[test]
    fn gray_image_fails() {
        let img = BgrImage::filled(60, 60, [128, 128, 128]);
        let rep = ColorfulnessFallback::new(ColorfulnessParams::default()).evaluate(&img);
        assert_eq!(rep.qualifying_cells, 0);
        assert!(!rep.ok);
    }
}
