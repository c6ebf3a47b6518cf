//! Box tightening in warped space and back-projection to image coordinates.

use colorgrid_core::{convex_hull, order_clockwise_from_top_left, Homography};
use image::GrayImage;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Column/row coverage fraction that marks the marker edge.
    pub profile_threshold: f64,
    /// Outward padding per side, relative to the trimmed span.
    pub pad_frac: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            profile_threshold: 0.10,
            pad_frac: 0.03,
        }
    }
}

/// Tight rectangle in warped coordinates (inclusive pixel bounds).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WarpedBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl WarpedBox {
    pub fn corners(&self) -> [Point2<f32>; 4] {
        [
            Point2::new(self.x0, self.y0),
            Point2::new(self.x1, self.y0),
            Point2::new(self.x1, self.y1),
            Point2::new(self.x0, self.y1),
        ]
    }
}

/// First and last index whose value exceeds `threshold`; the full range if none does.
fn trim(profile: &[f64], threshold: f64) -> (usize, usize) {
    let last = profile.len().saturating_sub(1);
    let lo = profile.iter().position(|&f| f > threshold);
    let hi = profile.iter().rposition(|&f| f > threshold);
    match (lo, hi) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => (0, last),
    }
}

fn pad(lo: usize, hi: usize, frac: f64, last: usize) -> (f32, f32) {
    let p = frac * (hi - lo) as f64;
    let lo = (lo as f64 - p).max(0.0);
    let hi = (hi as f64 + p).min(last as f64);
    (lo as f32, hi as f32)
}

/// Tight axis-aligned box around the set pixels of the warped mask.
pub fn tight_box(mask: &GrayImage, params: &RefineParams) -> WarpedBox {
    let (w, h) = mask.dimensions();
    let mut cols = vec![0u32; w as usize];
    let mut rows = vec![0u32; h as usize];
    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] > 0 {
            cols[x as usize] += 1;
            rows[y as usize] += 1;
        }
    }
    let col_frac: Vec<f64> = cols.iter().map(|&c| c as f64 / h.max(1) as f64).collect();
    let row_frac: Vec<f64> = rows.iter().map(|&c| c as f64 / w.max(1) as f64).collect();

    let (cx0, cx1) = trim(&col_frac, params.profile_threshold);
    let (cy0, cy1) = trim(&row_frac, params.profile_threshold);
    let (x0, x1) = pad(cx0, cx1, params.pad_frac, (w as usize).saturating_sub(1));
    let (y0, y1) = pad(cy0, cy1, params.pad_frac, (h as usize).saturating_sub(1));
    WarpedBox { x0, y0, x1, y1 }
}

/// Refined boundary in image coordinates.
///
/// The box corners are mapped back through `h_inv`, hulled and re-approximated
/// to four vertices; if that fails the hull itself is returned.
pub fn refine_boundary(
    warped_mask: &GrayImage,
    h_inv: &Homography,
    params: &RefineParams,
) -> (WarpedBox, Vec<Point2<f32>>) {
    let bx = tight_box(warped_mask, params);
    debug!(
        "refined warped box x=[{:.1}, {:.1}] y=[{:.1}, {:.1}]",
        bx.x0, bx.x1, bx.y0, bx.y1
    );

    let projected: Vec<Point2<f32>> = bx.corners().iter().map(|c| h_inv.apply(*c)).collect();
    let hull = convex_hull(&projected);
    let polygon = match simplify_hull(&hull).as_slice() {
        &[a, b, c, d] => order_clockwise_from_top_left([a, b, c, d]).to_vec(),
        _ => hull,
    };
    (bx, polygon)
}

/// Douglas-Peucker at 2% of the hull perimeter, same tolerance as quad extraction.
///
/// The hull is cut at the vertex farthest from its first one and both open
/// chains are simplified, so every chord has distinct endpoints.
fn simplify_hull(hull: &[Point2<f32>]) -> Vec<Point2<f32>> {
    if hull.len() < 4 {
        return hull.to_vec();
    }
    let ring: Vec<Point<f32>> = hull.iter().map(|p| Point::new(p.x, p.y)).collect();
    let eps = 0.02 * arc_length(&ring, true);
    let origin = ring[0];
    let far = ring
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (a.x - origin.x).hypot(a.y - origin.y);
            let db = (b.x - origin.x).hypot(b.y - origin.y);
            da.total_cmp(&db)
        })
        .map_or(0, |(i, _)| i);
    if far == 0 || eps <= 0.0 {
        return hull.to_vec();
    }

    let mut tail = ring[far..].to_vec();
    tail.push(origin);
    let mut out = approximate_polygon_dp(&ring[..=far], eps, false);
    out.pop();
    let mut rest = approximate_polygon_dp(&tail, eps, false);
    rest.pop();
    out.extend(rest);
    out.into_iter().map(|p| Point2::new(p.x, p.y)).collect()
}
