//! Allowed-color segmentation: BGR image to a binary (0/255) mask.

use colorgrid_core::{BgrImage, BgrImageView};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::DetectError;
use crate::hsv::HsvPlanes;
use crate::params::SegmentationParams;
use crate::rim::WhiteRimSuppressor;

/// The six printed cell colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerColor {
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
}

/// Inclusive hue window (8-bit hue, `[0, 180)`) with its own S/V floors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HueInterval {
    pub color: MarkerColor,
    pub hue_min: u8,
    pub hue_max: u8,
    pub s_min: u8,
    pub v_min: u8,
}

const fn interval(color: MarkerColor, hue_min: u8, hue_max: u8, s_min: u8, v_min: u8) -> HueInterval {
    HueInterval {
        color,
        hue_min,
        hue_max,
        s_min,
        v_min,
    }
}

/// Red wraps around 0 and needs two windows.
pub const ALLOWED_COLORS: [HueInterval; 7] = [
    interval(MarkerColor::Red, 0, 10, 80, 50),
    interval(MarkerColor::Red, 170, 180, 80, 50),
    interval(MarkerColor::Yellow, 20, 35, 80, 70),
    interval(MarkerColor::Green, 40, 85, 60, 50),
    interval(MarkerColor::Cyan, 85, 100, 60, 60),
    interval(MarkerColor::Blue, 90, 130, 60, 50),
    interval(MarkerColor::Magenta, 135, 165, 60, 50),
];

/// Global floors raise the interval floor; `relax` lowers the result, but never
/// below `min` (or the raised floor, if that is already lower).
#[inline]
fn effective_floor(own: u8, global: u8, relax: u8, min: u8) -> u8 {
    let raised = own.max(global);
    raised.saturating_sub(relax).max(min.min(raised))
}

impl HueInterval {
    /// `(s_floor, v_floor)` under the given parameters and relaxation.
    pub fn floors(&self, params: &SegmentationParams, relax: u8) -> (u8, u8) {
        (
            effective_floor(self.s_min, params.s_floor, relax, params.sparse.s_min),
            effective_floor(self.v_min, params.v_floor, relax, params.sparse.v_min),
        )
    }

    #[inline]
    fn contains_hue(&self, h: u8) -> bool {
        (self.hue_min..=self.hue_max).contains(&h)
    }
}

/// Union of the seven interval tests at a fixed relaxation.
fn allowed_color_mask(hsv: &HsvPlanes, params: &SegmentationParams, relax: u8) -> GrayImage {
    let floors: Vec<(HueInterval, u8, u8)> = ALLOWED_COLORS
        .iter()
        .map(|iv| {
            let (s, v) = iv.floors(params, relax);
            (*iv, s, v)
        })
        .collect();

    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for (x, y, p) in mask.enumerate_pixels_mut() {
        let h = hsv.h.get_pixel(x, y)[0];
        let s = hsv.s.get_pixel(x, y)[0];
        let v = hsv.v.get_pixel(x, y)[0];
        if floors
            .iter()
            .any(|(iv, s_floor, v_floor)| iv.contains_hue(h) && s >= *s_floor && v >= *v_floor)
        {
            *p = Luma([255]);
        }
    }
    mask
}

/// Share of set pixels, in `[0, 1]`.
pub fn mask_fraction(mask: &GrayImage) -> f64 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    mask.pixels().filter(|p| p[0] > 0).count() as f64 / total as f64
}

/// Sigma of a Gaussian kernel of odd size `ksize` (same rule as common vision
/// libraries use when only the size is given).
fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn pre_blur(image: &BgrImageView<'_>, ksize: u32) -> BgrImage {
    // Blurring treats channels independently, so the RGB container is only storage.
    let Some(buf) = RgbImage::from_raw(
        image.width as u32,
        image.height as u32,
        image.data.to_vec(),
    ) else {
        return image.to_owned_image();
    };
    let blurred = gaussian_blur_f32(&buf, sigma_for_kernel(ksize));
    BgrImage {
        width: image.width,
        height: image.height,
        data: blurred.into_raw(),
    }
}

/// Morphological opening then closing with a 3x3 square element.
pub fn clean_mask(mask: GrayImage, open_iter: u32, close_iter: u32) -> GrayImage {
    let k = |iter: u32| iter.min(u8::MAX as u32) as u8;
    let mut out = mask;
    if open_iter > 0 {
        out = open(&out, Norm::LInf, k(open_iter));
    }
    if close_iter > 0 {
        out = close(&out, Norm::LInf, k(close_iter));
    }
    out
}

/// Segment the pixels whose color belongs to the marker palette.
///
/// The mask has the dimensions of `image`. Errors only on empty or malformed input.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = image.width, height = image.height))
)]
pub fn segment(
    image: &BgrImageView<'_>,
    params: &SegmentationParams,
) -> Result<GrayImage, DetectError> {
    image.validate()?;

    let blurred = params.blur_kernel().map(|k| pre_blur(image, k));
    let view = match &blurred {
        Some(b) => b.view(),
        None => *image,
    };

    let mut hsv = HsvPlanes::from_bgr(&view);
    hsv.normalize_value(&params.clahe);

    let suppressor = WhiteRimSuppressor::new(params.rim);
    let rim = params.rim.enabled.then(|| suppressor.rim_mask(&hsv));

    let colors_without_rim = |relax: u8| {
        let mut mask = allowed_color_mask(&hsv, params, relax);
        if let Some(rim) = &rim {
            let outcome = suppressor.suppress(&mut mask, rim);
            debug!(
                "white rim: {} of {} foreground px, applied={}",
                outcome.overlap, outcome.foreground, outcome.applied
            );
        }
        mask
    };

    let mut relax = params.floor_relax;
    let mut mask = colors_without_rim(relax);
    let mut attempts = 0;
    while attempts < params.sparse.max_attempts {
        let fraction = mask_fraction(&mask);
        if fraction >= params.sparse.min_fraction {
            break;
        }
        attempts += 1;
        relax = relax.saturating_add(params.sparse.step);
        debug!(
            "sparse mask ({:.4}%), relaxing floors by {} (attempt {})",
            fraction * 100.0,
            relax,
            attempts
        );
        mask = colors_without_rim(relax);
    }

    let mask = clean_mask(mask, params.open_iter, params.close_iter);
    debug!("segmented mask covers {:.2}%", mask_fraction(&mask) * 100.0);
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [0, 0, 255];
    const GREEN: [u8; 3] = [0, 255, 0];
    const BLUE: [u8; 3] = [255, 0, 0];

    #[test]
    fn global_floor_only_raises() {
        let params = SegmentationParams {
            s_floor: 0,
            v_floor: 0,
            ..SegmentationParams::default()
        };
        let red = ALLOWED_COLORS[0];
        assert_eq!(red.floors(&params, 0), (80, 50));

        let params = SegmentationParams {
            s_floor: 120,
            ..params
        };
        assert_eq!(red.floors(&params, 0).0, 120);
    }

    #[test]
    fn relaxation_is_clamped() {
        let params = SegmentationParams::default();
        let green = ALLOWED_COLORS[3];
        let (s, v) = green.floors(&params, 200);
        assert_eq!((s, v), (params.sparse.s_min, params.sparse.v_min));
    }

    #[test]
    fn red_wraps_around_zero() {
        let reds: Vec<_> = ALLOWED_COLORS
            .iter()
            .filter(|iv| iv.color == MarkerColor::Red)
            .collect();
        assert_eq!(reds.len(), 2);
        assert!(reds.iter().any(|iv| iv.contains_hue(2)));
        assert!(reds.iter().any(|iv| iv.contains_hue(178)));
    }

    #[test]
    fn rejects_empty_image() {
        let view = BgrImageView {
            width: 0,
            height: 10,
            data: &[],
        };
        let err = segment(&view, &SegmentationParams::default()).unwrap_err();
        assert_eq!(
            err,
            DetectError::EmptyImage {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn rejects_short_buffer() {
        let data = vec![0u8; 10];
        let view = BgrImageView {
            width: 4,
            height: 4,
            data: &data,
        };
        assert!(matches!(
            segment(&view, &SegmentationParams::default()),
            Err(DetectError::InvalidBuffer { expected: 48, got: 10 })
        ));
    }

    #[test]
    fn saturated_square_is_segmented() {
        let mut img = BgrImage::filled(80, 80, [0, 0, 0]);
        img.fill_rect(20, 20, 40, 40, GREEN);
        let mask = segment(&img.view(), &SegmentationParams::default()).expect("segment");

        assert_eq!(mask.dimensions(), (80, 80));
        assert_eq!(mask.get_pixel(40, 40)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn pastel_colors_are_rejected() {
        // Low saturation (~30) everywhere.
        let img = BgrImage::filled(60, 60, [200, 200, 230]);
        let mask = segment(&img.view(), &SegmentationParams::default()).expect("segment");
        assert!(mask_fraction(&mask) < 0.01);
    }

    #[test]
    fn opening_removes_isolated_specks() {
        let mut img = BgrImage::filled(60, 60, [0, 0, 0]);
        img.fill_rect(10, 10, 30, 30, BLUE);
        img.put_pixel(52, 52, RED);
        let params = SegmentationParams {
            blur_ksize: 0,
            ..SegmentationParams::default()
        };
        let mask = segment(&img.view(), &params).expect("segment");
        assert_eq!(mask.get_pixel(52, 52)[0], 0);
        assert_eq!(mask.get_pixel(25, 25)[0], 255);
    }

    #[test]
    fn mask_fraction_counts_set_pixels() {
        let mut m = GrayImage::new(10, 10);
        for x in 0..10 {
            m.put_pixel(x, 0, Luma([255]));
        }
        assert!((mask_fraction(&m) - 0.1).abs() < 1e-12);
        assert_eq!(mask_fraction(&GrayImage::new(0, 0)), 0.0);
    }

    #[test]
    fn kernel_sigma_matches_common_rule() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
    }
}
