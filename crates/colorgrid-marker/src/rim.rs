//! White-rim (specular highlight border) suppression.
//!
//! A rim pixel is bright, nearly unsaturated, and sits on or next to a strong
//! brightness edge. Glossy prints produce such rims around the colored cells and
//! they tend to glue the marker to bright background clutter.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};

use crate::hsv::HsvPlanes;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteRimParams {
    pub enabled: bool,
    /// Pixels with saturation at or below this count as "white".
    pub max_saturation: u8,
    /// Pixels with (normalized) value at or above this count as "bright".
    pub min_value: u8,
    /// Gaussian sigma of the unsharp mask applied to V before the gradient.
    pub sharpen_sigma: f32,
    /// Unsharp amount: `v + amount * (v - blur(v))`.
    pub sharpen_amount: f32,
    /// Sobel gradient magnitude that marks an edge.
    pub gradient_threshold: f32,
    /// Square dilation radius applied to the edge map.
    pub dilate_radius: u8,
    /// Suppression is skipped when it would remove more than this share of the mask.
    pub max_removed_fraction: f64,
}

impl Default for WhiteRimParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_saturation: 60,
            min_value: 200,
            sharpen_sigma: 1.0,
            sharpen_amount: 0.5,
            gradient_threshold: 80.0,
            dilate_radius: 1,
            max_removed_fraction: 0.35,
        }
    }
}

/// What a suppression pass did to the mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RimOutcome {
    /// Foreground pixels before suppression.
    pub foreground: usize,
    /// Foreground pixels that were also rim pixels.
    pub overlap: usize,
    /// `false` when the safety brake kept the mask untouched.
    pub applied: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct WhiteRimSuppressor {
    params: WhiteRimParams,
}

impl WhiteRimSuppressor {
    pub fn new(params: WhiteRimParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WhiteRimParams {
        &self.params
    }

    fn sharpened_value(&self, v: &GrayImage) -> GrayImage {
        if self.params.sharpen_sigma <= 0.0 || self.params.sharpen_amount == 0.0 {
            return v.clone();
        }
        let blurred = gaussian_blur_f32(v, self.params.sharpen_sigma);
        let amount = self.params.sharpen_amount;
        let mut out = GrayImage::new(v.width(), v.height());
        for (x, y, p) in out.enumerate_pixels_mut() {
            let orig = v.get_pixel(x, y)[0] as f32;
            let blur = blurred.get_pixel(x, y)[0] as f32;
            *p = Luma([(orig + amount * (orig - blur)).round().clamp(0.0, 255.0) as u8]);
        }
        out
    }

    fn edge_map(&self, v: &GrayImage) -> GrayImage {
        let sharp = self.sharpened_value(v);
        let gx = horizontal_sobel(&sharp);
        let gy = vertical_sobel(&sharp);
        let thr2 = self.params.gradient_threshold * self.params.gradient_threshold;

        let mut edges = GrayImage::new(v.width(), v.height());
        for (x, y, p) in edges.enumerate_pixels_mut() {
            let dx = gx.get_pixel(x, y)[0] as f32;
            let dy = gy.get_pixel(x, y)[0] as f32;
            if dx * dx + dy * dy >= thr2 {
                *p = Luma([255]);
            }
        }
        if self.params.dilate_radius > 0 {
            edges = dilate(&edges, Norm::LInf, self.params.dilate_radius);
        }
        edges
    }

    /// Binary map (0/255) of white-rim pixels.
    pub fn rim_mask(&self, hsv: &HsvPlanes) -> GrayImage {
        let edges = self.edge_map(&hsv.v);
        let mut rim = GrayImage::new(hsv.width(), hsv.height());
        for (x, y, p) in rim.enumerate_pixels_mut() {
            let white = hsv.s.get_pixel(x, y)[0] <= self.params.max_saturation
                && hsv.v.get_pixel(x, y)[0] >= self.params.min_value;
            if white && edges.get_pixel(x, y)[0] > 0 {
                *p = Luma([255]);
            }
        }
        rim
    }

    /// Remove rim pixels from `mask` unless that would erode too much of it.
    pub fn suppress(&self, mask: &mut GrayImage, rim: &GrayImage) -> RimOutcome {
        let mut foreground = 0usize;
        let mut overlap = 0usize;
        for (m, r) in mask.pixels().zip(rim.pixels()) {
            if m[0] > 0 {
                foreground += 1;
                if r[0] > 0 {
                    overlap += 1;
                }
            }
        }

        let too_much =
            overlap as f64 > self.params.max_removed_fraction * foreground as f64;
        if overlap == 0 || too_much {
            return RimOutcome {
                foreground,
                overlap,
                applied: false,
            };
        }

        for (m, r) in mask.pixels_mut().zip(rim.pixels()) {
            if r[0] > 0 {
                m[0] = 0;
            }
        }
        RimOutcome {
            foreground,
            overlap,
            applied: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planes(s: &GrayImage, v: &GrayImage) -> HsvPlanes {
        HsvPlanes {
            h: GrayImage::new(s.width(), s.height()),
            s: s.clone(),
            v: v.clone(),
        }
    }

    /// Left half dark, right half bright and unsaturated.
    fn bright_step(w: u32, h: u32) -> HsvPlanes {
        let s = GrayImage::new(w, h);
        let mut v = GrayImage::new(w, h);
        for (x, _, p) in v.enumerate_pixels_mut() {
            if x >= w / 2 {
                *p = Luma([250]);
            }
        }
        planes(&s, &v)
    }

    #[test]
    fn rim_follows_bright_edges_only() {
        let hsv = bright_step(40, 20);
        let rim = WhiteRimSuppressor::new(WhiteRimParams::default()).rim_mask(&hsv);

        assert!(rim.get_pixel(20, 10)[0] > 0, "bright pixel at the step is a rim");
        assert_eq!(rim.get_pixel(35, 10)[0], 0, "flat bright area is not a rim");
        assert_eq!(rim.get_pixel(18, 10)[0], 0, "dark side is not white");
    }

    #[test]
    fn saturated_pixels_are_never_rim() {
        let mut hsv = bright_step(40, 20);
        hsv.s = GrayImage::from_pixel(40, 20, Luma([200]));
        let rim = WhiteRimSuppressor::new(WhiteRimParams::default()).rim_mask(&hsv);
        assert!(rim.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn suppression_removes_small_overlap() {
        let suppressor = WhiteRimSuppressor::new(WhiteRimParams::default());
        let mut mask = GrayImage::from_pixel(10, 10, Luma([255]));
        let mut rim = GrayImage::new(10, 10);
        for y in 0..10 {
            rim.put_pixel(0, y, Luma([255]));
        }
        let outcome = suppressor.suppress(&mut mask, &rim);
        assert!(outcome.applied);
        assert_eq!(outcome.overlap, 10);
        assert_eq!(mask.get_pixel(0, 5)[0], 0);
        assert_eq!(mask.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn safety_brake_keeps_mask_when_overlap_is_large() {
        let suppressor = WhiteRimSuppressor::new(WhiteRimParams::default());
        let mut mask = GrayImage::from_pixel(10, 10, Luma([255]));
        let before = mask.clone();
        let mut rim = GrayImage::new(10, 10);
        for y in 0..10 {
            for x in 0..5 {
                rim.put_pixel(x, y, Luma([255]));
            }
        }
        let outcome = suppressor.suppress(&mut mask, &rim);
        assert!(!outcome.applied);
        assert_eq!(mask, before);
    }
}
