//! 3x3 grid validation on the warped (square) mask.

use image::GrayImage;
use log::debug;
use serde::Serialize;

/// Inter-cell seam positions along both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Seams {
    /// Vertical seams (column indices).
    pub x: [usize; 2],
    /// Horizontal seams (row indices).
    pub y: [usize; 2],
    pub ok: bool,
}

/// Per-cell share of set mask pixels, indexed `[row][col]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CellsReport {
    pub fractions: [[f64; 3]; 3],
    pub ok: bool,
}

/// `[start, end)` ranges of the three cells along an axis of length `n`.
/// The last cell absorbs the remainder.
pub fn cell_bounds(n: usize) -> [(usize, usize); 3] {
    let step = n / 3;
    [(0, step), (step, 2 * step), (2 * step, n)]
}

fn column_profile(mask: &GrayImage) -> Vec<u32> {
    let mut prof = vec![0u32; mask.width() as usize];
    for (x, _, p) in mask.enumerate_pixels() {
        if p[0] > 0 {
            prof[x as usize] += 1;
        }
    }
    prof
}

fn row_profile(mask: &GrayImage) -> Vec<u32> {
    let mut prof = vec![0u32; mask.height() as usize];
    for (_, y, p) in mask.enumerate_pixels() {
        if p[0] > 0 {
            prof[y as usize] += 1;
        }
    }
    prof
}

/// Lowest point of `profile[lo..hi]`: the midpoint of the minimum-valued run
/// closest to `ideal`.
fn seam_in_window(profile: &[u32], lo: usize, hi: usize, ideal: f64) -> Option<usize> {
    let window = profile.get(lo..hi)?;
    let min = *window.iter().min()?;

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < window.len() {
        if window[i] != min {
            i += 1;
            continue;
        }
        let start = i;
        while i < window.len() && window[i] == min {
            i += 1;
        }
        let mid = lo + (start + i - 1) / 2;
        let dist = (mid as f64 - ideal).abs();
        if best.is_none_or(|(d, _)| dist < d) {
            best = Some((dist, mid));
        }
    }
    best.map(|(_, mid)| mid)
}

/// Find the two seams of one axis; `ok` when both sit near their thirds and are
/// well separated.
fn seams_on_axis(profile: &[u32]) -> ([usize; 2], bool) {
    let n = profile.len();
    if n < 6 {
        return ([0, 0], false);
    }
    let nf = n as f64;
    let ideals = [nf / 3.0, 2.0 * nf / 3.0];
    let windows = [(n / 6, n / 2), (n / 2, 5 * n / 6)];
    let tolerance = nf / 12.0;

    let mut seams = [0usize; 2];
    let mut ok = true;
    for (k, ((lo, hi), ideal)) in windows.into_iter().zip(ideals).enumerate() {
        match seam_in_window(profile, lo, hi, ideal) {
            Some(s) => {
                seams[k] = s;
                ok &= (s as f64 - ideal).abs() <= tolerance;
            }
            None => ok = false,
        }
    }
    ok &= (seams[1] as f64 - seams[0] as f64) > nf / 6.0;
    (seams, ok)
}

/// Locate the two vertical and two horizontal seams of the grid.
pub fn check_seams(mask: &GrayImage) -> Seams {
    let (x, ok_x) = seams_on_axis(&column_profile(mask));
    let (y, ok_y) = seams_on_axis(&row_profile(mask));
    debug!("seams x={x:?} ({ok_x}) y={y:?} ({ok_y})");
    Seams {
        x,
        y,
        ok: ok_x && ok_y,
    }
}

/// Share of set pixels in each of the 3x3 cells of a square mask.
///
/// Empty or non-square masks give all-zero fractions and `ok == false`.
pub fn check_cells(mask: &GrayImage, min_fraction: f64) -> CellsReport {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 || w != h {
        return CellsReport::default();
    }
    let bounds = cell_bounds(w as usize);

    let mut fractions = [[0.0f64; 3]; 3];
    for (r, &(y0, y1)) in bounds.iter().enumerate() {
        for (c, &(x0, x1)) in bounds.iter().enumerate() {
            let area = (y1 - y0) * (x1 - x0);
            if area == 0 {
                continue;
            }
            let mut set = 0usize;
            for y in y0..y1 {
                for x in x0..x1 {
                    if mask.get_pixel(x as u32, y as u32)[0] > 0 {
                        set += 1;
                    }
                }
            }
            fractions[r][c] = set as f64 / area as f64;
        }
    }
    let ok = fractions.iter().flatten().all(|&f| f >= min_fraction);
    debug!("cell fractions {fractions:?} ok={ok}");
    CellsReport { fractions, ok }
}

/// Final grid verdict.
///
/// | mode    | rule                          |
/// |---------|-------------------------------|
/// | strict  | seams valid AND cells valid   |
/// | relaxed | cells valid OR fallback valid |
pub fn grid_decision(strict: bool, seams_ok: bool, cells_ok: bool, fallback_ok: bool) -> bool {
    if strict {
        seams_ok && cells_ok
    } else {
        cells_ok || fallback_ok
    }
}
