//! Planar homographies and perspective warping of BGR images.

use crate::{sample_bilinear_bgr_u8, BgrImage, BgrImageView, BGR_CHANNELS};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Smallest accepted ratio between the smallest and the largest singular value.
const SINGULAR_REL_EPS: f64 = 1e-12;

/// 3x3 projective transform, normalized so that `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    /// Invert through the SVD; `None` when the matrix is (numerically) singular.
    pub fn inverse(&self) -> Option<Self> {
        let svd = self.h.svd(true, true);
        let max = svd.singular_values.max();
        let min = svd.singular_values.min();
        if !max.is_finite() || max <= 0.0 || min / max < SINGULAR_REL_EPS {
            return None;
        }
        let inv = svd.pseudo_inverse(0.0).ok()?;
        scale_to_unit(inv).map(Self::new)
    }
}

fn scale_to_unit(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let w = h[(2, 2)];
    (w.is_finite() && w.abs() >= 1e-12).then(|| h / w)
}

/// Similarity that moves the centroid to the origin and the mean distance to sqrt(2).
fn conditioning(pts: &[Point2<f32>; 4]) -> Matrix3<f64> {
    let c = pts
        .iter()
        .fold(Vector3::zeros(), |acc: Vector3<f64>, p| {
            acc + Vector3::new(p.x as f64, p.y as f64, 0.0)
        })
        / 4.0;
    let spread = pts
        .iter()
        .map(|p| (p.x as f64 - c.x).hypot(p.y as f64 - c.y))
        .sum::<f64>()
        / 4.0;
    let s = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0)
}

fn conditioned(t: &Matrix3<f64>, p: Point2<f32>) -> (f64, f64) {
    let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
    (v.x, v.y)
}

/// Homography `H` with `dst ~ H * src` from four correspondences (same corner order).
///
/// Both point sets are conditioned first; `None` when the system is singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let t_src = conditioning(src);
    let t_dst = conditioning(dst);

    // h33 fixed to 1; two equations per correspondence.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let (x, y) = conditioned(&t_src, *s);
        let (u, v) = conditioned(&t_dst, *d);
        let (ru, rv) = (2 * k, 2 * k + 1);

        a.fixed_view_mut::<1, 8>(ru, 0)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
        a.fixed_view_mut::<1, 8>(rv, 0)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
        b[ru] = u;
        b[rv] = v;
    }

    let sol = a.lu().solve(&b)?;
    if sol.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let hn = Matrix3::new(sol[0], sol[1], sol[2], sol[3], sol[4], sol[5], sol[6], sol[7], 1.0);
    let h = t_dst.try_inverse()? * hn * t_src;
    scale_to_unit(h).map(Homography::new)
}

/// Inverse warp into an `out_w x out_h` image with bilinear sampling and edge replication.
///
/// Destination pixel `(x, y)` samples `h_img_from_rect * (x, y)`, so rectified corners
/// `(0,0)` and `(w-1,h-1)` land exactly on their source points.
pub fn warp_perspective_bgr(
    src: &BgrImageView<'_>,
    h_img_from_rect: &Homography,
    out_w: usize,
    out_h: usize,
) -> BgrImage {
    let mut data = vec![0u8; out_w * out_h * BGR_CHANNELS];
    for (i, px) in data.chunks_exact_mut(BGR_CHANNELS).enumerate() {
        let (x, y) = (i % out_w, i / out_w);
        let p = h_img_from_rect.apply(Point2::new(x as f32, y as f32));
        px.copy_from_slice(&sample_bilinear_bgr_u8(src, p.x, p.y));
    }
    BgrImage {
        width: out_w,
        height: out_h,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_maps_close(a: Point2<f32>, b: Point2<f32>) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-3);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-3);
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");
        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            assert_maps_close(inv.apply(h.apply(p)), p);
        }
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let h = Homography::new(Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0));
        assert!(h.inverse().is_none());
    }

    #[test]
    fn four_points_recover_a_known_homography() {
        let truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));
        let square = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(299.0, 0.0),
            Point2::new(299.0, 299.0),
            Point2::new(0.0, 299.0),
        ];
        let quad = square.map(|p| truth.apply(p));
        let h = homography_from_4pt(&square, &quad).expect("solvable");
        for p in [Point2::new(10.0_f32, 250.0), Point2::new(150.0, 150.0)] {
            assert_maps_close(h.apply(p), truth.apply(p));
        }
    }

    #[test]
    fn collapsed_points_have_no_homography() {
        let p = Point2::new(5.0_f32, 5.0);
        let dst = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(homography_from_4pt(&[p; 4], &dst).is_none());
    }

    #[test]
    fn identity_warp_copies_pixels() {
        let mut img = BgrImage::filled(4, 3, [10, 20, 30]);
        img.put_pixel(2, 1, [200, 100, 0]);
        let out = warp_perspective_bgr(&img.view(), &Homography::new(Matrix3::identity()), 4, 3);
        assert_eq!(out, img);
    }
}
