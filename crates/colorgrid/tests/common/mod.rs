#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

/// Row-major R,G,B cell colors covering all six marker colors.
pub const GRID_RGB: [[u8; 3]; 9] = [
    [255, 0, 0],
    [255, 255, 0],
    [0, 255, 0],
    [0, 255, 255],
    [0, 0, 255],
    [255, 0, 255],
    [0, 255, 0],
    [255, 0, 0],
    [0, 0, 255],
];

/// Black `canvas x canvas` image with a centered marker of `cell` px cells.
pub fn marker_scene(canvas: u32, cell: u32) -> RgbImage {
    let offset = (canvas - 3 * cell) / 2;
    let mut img = RgbImage::new(canvas, canvas);
    for (x, y, p) in img.enumerate_pixels_mut() {
        let (cx, cy) = (x.wrapping_sub(offset), y.wrapping_sub(offset));
        if cx < 3 * cell && cy < 3 * cell {
            let idx = (cy / cell * 3 + cx / cell) as usize;
            *p = Rgb(GRID_RGB[idx]);
        }
    }
    img
}

pub fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("write png fixture");
    path
}
