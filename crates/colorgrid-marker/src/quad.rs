//! Quadrilateral extraction from the allowed-color mask.

use colorgrid_core::{is_convex, is_degenerate_quad, order_clockwise_from_top_left, polygon_area};
use image::imageops::replace;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::morphology::close;
use imageproc::point::Point;
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Douglas-Peucker tolerance relative to the contour perimeter.
const APPROX_EPS_FRAC: f64 = 0.02;

fn to_f32(points: &[Point<i32>]) -> Vec<Point2<f32>> {
    points
        .iter()
        .map(|p| Point2::new(p.x as f32, p.y as f32))
        .collect()
}

/// Outer contour with the largest enclosed area.
///
/// Regions touching the image border are not reported as outer borders by
/// `find_contours`, so the mask is traced inside a 1 px background frame and the
/// points are shifted back.
fn largest_outer_contour(mask: &GrayImage) -> Option<Vec<Point<i32>>> {
    let (w, h) = mask.dimensions();
    let mut framed = GrayImage::new(w + 2, h + 2);
    replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            (polygon_area(&to_f32(&points)), points)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, points)| points)
}

/// Best-fit quadrilateral around the largest marker-colored region.
///
/// Corners are ordered clockwise starting near the top-left. Returns `None` when
/// the mask has no region, or when the only candidate has no area.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn find_quad(mask: &GrayImage) -> Option<[Point2<f32>; 4]> {
    let bridged = close(mask, Norm::LInf, 1);
    let contour = largest_outer_contour(&bridged)?;
    if contour.len() < 3 {
        return None;
    }

    let eps = APPROX_EPS_FRAC * arc_length(&contour, true);
    let approx = approximate_polygon_dp(&contour, eps, true);
    let approx_f = to_f32(&approx);

    let corners: [Point2<f32>; 4] = if approx_f.len() == 4 && is_convex(&approx_f) {
        [approx_f[0], approx_f[1], approx_f[2], approx_f[3]]
    } else {
        debug!(
            "polygon approximation gave {} vertices, using min-area rectangle",
            approx_f.len()
        );
        let rect = min_area_rect(&contour);
        let r = to_f32(&rect);
        [r[0], r[1], r[2], r[3]]
    };

    let quad = order_clockwise_from_top_left(corners);
    if is_degenerate_quad(&quad) {
        debug!("largest region has no usable area");
        return None;
    }
    Some(quad)
}
