//! HSV planes and local contrast normalization of the value channel.
//!
//! Hue follows the 8-bit convention used by the color table: degrees / 2, so the
//! range is `[0, 180)`. Saturation and value are scaled to `[0, 255]`.

use colorgrid_core::BgrImageView;
use image::{GrayImage, Luma};
use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};

/// Contrast-limited adaptive histogram equalization settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheParams {
    /// Histogram clip limit relative to a uniform histogram; `<= 0` disables clipping.
    pub clip_limit: f32,
    /// Number of tiles along each axis.
    pub tiles: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles: 8,
        }
    }
}

/// Separate H, S and V planes of a BGR image.
#[derive(Clone, Debug)]
pub struct HsvPlanes {
    pub h: GrayImage,
    pub s: GrayImage,
    pub v: GrayImage,
}

/// Convert one B,G,R pixel to 8-bit `[h, s, v]`.
#[inline]
pub fn bgr_to_hsv8(bgr: [u8; 3]) -> [u8; 3] {
    let rgb = Srgb::new(bgr[2], bgr[1], bgr[0]).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(rgb);
    let h = (hsv.hue.into_positive_degrees() * 0.5).round() as u32 % 180;
    let s = (hsv.saturation * 255.0).round().clamp(0.0, 255.0);
    let v = (hsv.value * 255.0).round().clamp(0.0, 255.0);
    [h as u8, s as u8, v as u8]
}

impl HsvPlanes {
    pub fn from_bgr(src: &BgrImageView<'_>) -> Self {
        let (w, h) = (src.width as u32, src.height as u32);
        let mut hp = GrayImage::new(w, h);
        let mut sp = GrayImage::new(w, h);
        let mut vp = GrayImage::new(w, h);
        for y in 0..src.height {
            for x in 0..src.width {
                let [hh, ss, vv] = bgr_to_hsv8(src.pixel(x, y));
                hp.put_pixel(x as u32, y as u32, Luma([hh]));
                sp.put_pixel(x as u32, y as u32, Luma([ss]));
                vp.put_pixel(x as u32, y as u32, Luma([vv]));
            }
        }
        Self {
            h: hp,
            s: sp,
            v: vp,
        }
    }

    pub fn width(&self) -> u32 {
        self.v.width()
    }

    pub fn height(&self) -> u32 {
        self.v.height()
    }

    /// Replace V with its CLAHE-normalized version.
    pub fn normalize_value(&mut self, params: &ClaheParams) {
        self.v = clahe(&self.v, params);
    }
}

fn tile_lut(src: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[src.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    let scale = 255.0 / area as f32;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Contrast-limited adaptive histogram equalization with bilinear blending
/// between neighbouring tile mappings.
pub fn clahe(src: &GrayImage, params: &ClaheParams) -> GrayImage {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }
    let tiles = params.tiles.max(1);
    let tw = w.div_ceil(tiles).max(1);
    let th = h.div_ceil(tiles).max(1);
    let tiles_x = w.div_ceil(tw);
    let tiles_y = h.div_ceil(th);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tw, ty * th);
            let (x1, y1) = ((x0 + tw).min(w), (y0 + th).min(h));
            luts.push(tile_lut(src, x0, y0, x1, y1, params.clip_limit));
        }
    }
    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let gy = ((y as f32 + 0.5) / th as f32 - 0.5).max(0.0);
        let ty0 = (gy.floor() as u32).min(tiles_y - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fy = (gy - ty0 as f32).clamp(0.0, 1.0);
        for x in 0..w {
            let gx = ((x as f32 + 0.5) / tw as f32 - 0.5).max(0.0);
            let tx0 = (gx.floor() as u32).min(tiles_x - 1);
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let fx = (gx - tx0 as f32).clamp(0.0, 1.0);

            let v = src.get_pixel(x, y)[0] as usize;
            let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - fx) + lut_at(tx1, ty0)[v] as f32 * fx;
            let bottom =
                lut_at(tx0, ty1)[v] as f32 * (1.0 - fx) + lut_at(tx1, ty1)[v] as f32 * fx;
            let mapped = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, Luma([mapped.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_land_on_expected_hues() {
        // B,G,R inputs
        assert_eq!(bgr_to_hsv8([0, 0, 255]), [0, 255, 255]); // red
        assert_eq!(bgr_to_hsv8([0, 255, 0]), [60, 255, 255]); // green
        assert_eq!(bgr_to_hsv8([255, 0, 0]), [120, 255, 255]); // blue
        assert_eq!(bgr_to_hsv8([0, 255, 255]), [30, 255, 255]); // yellow
        assert_eq!(bgr_to_hsv8([255, 255, 0]), [90, 255, 255]); // cyan
        assert_eq!(bgr_to_hsv8([255, 0, 255]), [150, 255, 255]); // magenta
    }

    #[test]
    fn grays_have_no_saturation() {
        assert_eq!(bgr_to_hsv8([128, 128, 128])[1], 0);
        assert_eq!(bgr_to_hsv8([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn clahe_keeps_flat_images_flat() {
        let src = GrayImage::from_pixel(64, 48, Luma([128]));
        let out = clahe(&src, &ClaheParams::default());
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn clahe_stretches_low_contrast_tiles() {
        let mut src = GrayImage::new(32, 32);
        for (x, _, p) in src.enumerate_pixels_mut() {
            *p = Luma([100 + (x % 16) as u8]);
        }
        let params = ClaheParams {
            tiles: 1,
            ..ClaheParams::default()
        };
        let out = clahe(&src, &params);
        let lo = out.pixels().map(|p| p[0]).min().unwrap_or(0);
        let hi = out.pixels().map(|p| p[0]).max().unwrap_or(0);
        assert!(hi - lo > 15, "range {lo}..{hi} not stretched");
    }
}
