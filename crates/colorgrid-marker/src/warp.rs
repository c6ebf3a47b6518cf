//! Perspective normalization of the marker quadrilateral to an `N x N` square.

use colorgrid_core::{
    homography_from_4pt, is_degenerate_quad, warp_perspective_bgr, BgrImage, BgrImageView,
    GeometryError, Homography,
};
use nalgebra::Point2;

/// Canonical square view of the marker.
#[derive(Clone, Debug)]
pub struct WarpResult {
    pub image: BgrImage,
    /// Image coordinates to square coordinates.
    pub h: Homography,
    /// Square coordinates back to image coordinates.
    pub h_inv: Homography,
}

/// Corners of the canonical square, clockwise from the top-left.
pub fn square_corners(n: usize) -> [Point2<f32>; 4] {
    let m = n.saturating_sub(1) as f32;
    [
        Point2::new(0.0, 0.0),
        Point2::new(m, 0.0),
        Point2::new(m, m),
        Point2::new(0.0, m),
    ]
}

/// Warp the region bounded by `quad` (clockwise from top-left) into an `n x n` image.
pub fn warp_to_square(
    image: &BgrImageView<'_>,
    quad: &[Point2<f32>; 4],
    n: usize,
) -> Result<WarpResult, GeometryError> {
    if is_degenerate_quad(quad) {
        return Err(GeometryError::DegenerateQuad);
    }
    let h = homography_from_4pt(quad, &square_corners(n)).ok_or(GeometryError::SingularHomography)?;
    let h_inv = h.inverse().ok_or(GeometryError::SingularHomography)?;
    let warped = warp_perspective_bgr(image, &h_inv, n, n);
    Ok(WarpResult {
        image: warped,
        h,
        h_inv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_maps_square_corners_back_to_quad() {
        let img = BgrImage::filled(200, 160, [10, 20, 30]);
        let quad = [
            Point2::new(30.0, 20.0),
            Point2::new(170.0, 35.0),
            Point2::new(160.0, 140.0),
            Point2::new(25.0, 120.0),
        ];
        let n = 64;
        let w = warp_to_square(&img.view(), &quad, n).expect("warp");
        assert_eq!((w.image.width, w.image.height), (n, n));

        for (c, q) in square_corners(n).iter().zip(quad.iter()) {
            let back = w.h_inv.apply(*c);
            assert!((back - *q).norm() < 0.5, "{back:?} vs {q:?}");
            let fwd = w.h.apply(*q);
            assert!((fwd - *c).norm() < 0.5, "{fwd:?} vs {c:?}");
        }
    }

    #[test]
    fn warped_content_comes_from_inside_the_quad() {
        let mut img = BgrImage::filled(100, 100, [0, 0, 0]);
        img.fill_rect(40, 40, 20, 20, [0, 255, 0]);
        let quad = [
            Point2::new(40.0, 40.0),
            Point2::new(59.0, 40.0),
            Point2::new(59.0, 59.0),
            Point2::new(40.0, 59.0),
        ];
        let w = warp_to_square(&img.view(), &quad, 40).expect("warp");
        assert_eq!(w.image.pixel(20, 20), [0, 255, 0]);
        assert_eq!(w.image.pixel(0, 0), [0, 255, 0]);
    }

    #[test]
    fn collinear_quad_is_rejected() {
        let img = BgrImage::filled(50, 50, [0, 0, 0]);
        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert_eq!(
            warp_to_square(&img.view(), &quad, 32).unwrap_err(),
            GeometryError::DegenerateQuad
        );
    }
}
