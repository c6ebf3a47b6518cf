#![allow(dead_code)]

use colorgrid_core::BgrImage;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

pub const RED: [u8; 3] = [0, 0, 255];
pub const YELLOW: [u8; 3] = [0, 255, 255];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const CYAN: [u8; 3] = [255, 255, 0];
pub const BLUE: [u8; 3] = [255, 0, 0];
pub const MAGENTA: [u8; 3] = [255, 0, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Row-major cell colors (B,G,R) of the synthetic marker.
pub const GRID_COLORS: [[u8; 3]; 9] = [
    RED, YELLOW, GREEN, CYAN, BLUE, MAGENTA, GREEN, RED, BLUE,
];

/// Paint a 3x3 marker with `cell` px cells at `(x0, y0)`.
pub fn paint_grid(img: &mut BgrImage, x0: usize, y0: usize, cell: usize, colors: &[[u8; 3]; 9]) {
    for (i, bgr) in colors.iter().enumerate() {
        img.fill_rect(x0 + (i % 3) * cell, y0 + (i / 3) * cell, cell, cell, *bgr);
    }
}

/// Marker that fills the whole `3*cell` square.
pub fn grid_image(cell: usize) -> BgrImage {
    let mut img = BgrImage::filled(3 * cell, 3 * cell, BLACK);
    paint_grid(&mut img, 0, 0, cell, &GRID_COLORS);
    img
}

/// Marker centered on a black `canvas x canvas` background.
pub fn grid_on_canvas(canvas: usize, cell: usize) -> BgrImage {
    let mut img = BgrImage::filled(canvas, canvas, BLACK);
    let offset = (canvas - 3 * cell) / 2;
    paint_grid(&mut img, offset, offset, cell, &GRID_COLORS);
    img
}

/// Rotate around the image center, filling uncovered pixels with black.
pub fn rotated(img: &BgrImage, degrees: f32) -> BgrImage {
    // channel order is irrelevant to the rotation, RgbImage is only storage
    let buf = RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .expect("buffer matches dimensions");
    let out = rotate_about_center(
        &buf,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    );
    BgrImage {
        width: img.width,
        height: img.height,
        data: out.into_raw(),
    }
}
