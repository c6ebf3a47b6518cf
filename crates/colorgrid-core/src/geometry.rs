//! Planar polygon utilities shared by quad extraction and boundary refinement.

use nalgebra::Point2;
use thiserror::Error;

/// Geometric precondition failures.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("degenerate quadrilateral (zero area or collinear corners)")]
    DegenerateQuad,
    #[error("homography is singular")]
    SingularHomography,
}

const AREA_EPS: f64 = 1e-6;

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f64 {
    let (ox, oy) = (o.x as f64, o.y as f64);
    (a.x as f64 - ox) * (b.y as f64 - oy) - (a.y as f64 - oy) * (b.x as f64 - ox)
}

/// Signed shoelace area (positive for clockwise order in image coordinates).
pub fn signed_polygon_area(poly: &[Point2<f32>]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for (i, p) in poly.iter().enumerate() {
        let q = poly[(i + 1) % poly.len()];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    0.5 * acc
}

/// Absolute shoelace area.
pub fn polygon_area(poly: &[Point2<f32>]) -> f64 {
    signed_polygon_area(poly).abs()
}

/// Polygon area as a percentage of a `width × height` image, clamped to `[0, 100]`.
///
/// Returns 0 for fewer than 3 vertices or a non-positive image area.
pub fn coverage_percent(poly: &[Point2<f32>], width: usize, height: usize) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let total = width as f64 * height as f64;
    if total <= 0.0 {
        return 0.0;
    }
    (100.0 * polygon_area(poly) / total).clamp(0.0, 100.0)
}

/// Sort 4 points clockwise around their centroid, starting from the top-left.
///
/// Points are ordered by polar angle (image y axis points down, so increasing angle
/// is clockwise on screen), then rotated so the point with the smallest `x + y` is first.
pub fn order_clockwise_from_top_left(pts: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let cx = pts.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f32>() / 4.0;

    let mut sorted = pts;
    sorted.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let start = sorted
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.x + a.y)
                .partial_cmp(&(b.x + b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    sorted.rotate_left(start);
    sorted
}

/// `true` if the closed polygon turns consistently in one direction.
pub fn is_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i8;
    for i in 0..n {
        let c = cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]);
        if c.abs() <= f64::EPSILON {
            continue;
        }
        let s = if c > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    sign != 0
}

/// Zero area, or three consecutive corners on a line.
pub fn is_degenerate_quad(quad: &[Point2<f32>; 4]) -> bool {
    if polygon_area(quad) < AREA_EPS {
        return true;
    }
    (0..4).any(|i| {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = quad[(i + 2) % 4];
        let scale = ((b.x - a.x).hypot(b.y - a.y) as f64) * ((c.x - b.x).hypot(c.y - b.y) as f64);
        scale <= AREA_EPS || cross(a, b, c).abs() <= AREA_EPS * scale.max(1.0)
    })
}

/// Convex hull (Andrew's monotone chain), returned in clockwise image order.
pub fn convex_hull(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut pts: Vec<Point2<f32>> = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let half_hull = |iter: &mut dyn Iterator<Item = Point2<f32>>| {
        let mut chain: Vec<Point2<f32>> = Vec::new();
        for p in iter {
            while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0.0
            {
                chain.pop();
            }
            chain.push(p);
        }
        chain.pop();
        chain
    };

    let mut hull = half_hull(&mut pts.iter().copied());
    hull.extend(half_hull(&mut pts.iter().rev().copied()));
    hull
}
