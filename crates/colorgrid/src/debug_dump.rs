//! Best-effort persistence of intermediate detection images.

use std::path::{Path, PathBuf};

use colorgrid_core::BgrImage;
use colorgrid_marker::DetectionTrace;
use image::{GrayImage, Rgb};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use log::{debug, warn};
use nalgebra::Point2;

use crate::detect::rgb_from_bgr;

const POLYGON_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const QUAD_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Number of artifacts written and failed in one [`DebugDump::write`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub written: usize,
    pub failed: usize,
}

/// Writes `<stem>_mask.png`, `<stem>_poly.png`, `<stem>_warped.png` and
/// `<stem>_warped_mask.png` into a directory. Errors are logged, never returned.
#[derive(Clone, Debug)]
pub struct DebugDump {
    dir: PathBuf,
}

fn draw_closed(canvas: &mut image::RgbImage, poly: &[Point2<f32>], color: Rgb<u8>) {
    for (i, p) in poly.iter().enumerate() {
        let q = poly[(i + 1) % poly.len()];
        draw_line_segment_mut(canvas, (p.x, p.y), (q.x, q.y), color);
    }
}

impl DebugDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn save_rgb(&self, name: &str, img: &image::RgbImage, summary: &mut DumpSummary) {
        let path = self.dir.join(name);
        match img.save(&path) {
            Ok(()) => summary.written += 1,
            Err(err) => {
                warn!("debug dump: cannot write {}: {err}", path.display());
                summary.failed += 1;
            }
        }
    }

    fn save_gray(&self, name: &str, img: &GrayImage, summary: &mut DumpSummary) {
        let path = self.dir.join(name);
        match img.save(&path) {
            Ok(()) => summary.written += 1,
            Err(err) => {
                warn!("debug dump: cannot write {}: {err}", path.display());
                summary.failed += 1;
            }
        }
    }

    /// Write every artifact present in `trace`; `image` is the original input.
    pub fn write(&self, stem: &str, image: &BgrImage, trace: &DetectionTrace) -> DumpSummary {
        let mut summary = DumpSummary::default();
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            warn!("debug dump: cannot create {}: {err}", self.dir.display());
            summary.failed += 1;
            return summary;
        }

        if let Some(mask) = &trace.mask {
            self.save_gray(&format!("{stem}_mask.png"), mask, &mut summary);
        }

        let mut overlay = rgb_from_bgr(image);
        if let Some(quad) = &trace.quad {
            draw_closed(&mut overlay, quad, QUAD_COLOR);
        }
        if let Some(poly) = trace.polygon.as_deref().filter(|p| !p.is_empty()) {
            draw_closed(&mut overlay, poly, POLYGON_COLOR);
            for p in poly {
                draw_cross_mut(&mut overlay, POLYGON_COLOR, p.x.round() as i32, p.y.round() as i32);
            }
        }
        self.save_rgb(&format!("{stem}_poly.png"), &overlay, &mut summary);

        if let Some(warped) = &trace.warped {
            self.save_rgb(&format!("{stem}_warped.png"), &rgb_from_bgr(warped), &mut summary);
        }
        if let Some(warped_mask) = &trace.warped_mask {
            self.save_gray(&format!("{stem}_warped_mask.png"), warped_mask, &mut summary);
        }

        debug!(
            "debug dump {}: {} written, {} failed",
            self.dir.display(),
            summary.written,
            summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn trace_with_everything() -> DetectionTrace {
        DetectionTrace {
            mask: Some(GrayImage::from_pixel(20, 20, Luma([255]))),
            quad: Some([
                Point2::new(2.0, 2.0),
                Point2::new(17.0, 2.0),
                Point2::new(17.0, 17.0),
                Point2::new(2.0, 17.0),
            ]),
            warped: Some(BgrImage::filled(32, 32, [0, 255, 0])),
            warped_mask: Some(GrayImage::new(32, 32)),
            polygon: Some(vec![
                Point2::new(3.0, 3.0),
                Point2::new(16.0, 3.0),
                Point2::new(16.0, 16.0),
                Point2::new(3.0, 16.0),
            ]),
        }
    }

    #[test]
    fn writes_all_artifacts_into_a_new_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("nested").join("debug");
        let dump = DebugDump::new(&dir);
        let img = BgrImage::filled(20, 20, [0, 0, 0]);

        let summary = dump.write("scene", &img, &trace_with_everything());
        assert_eq!(summary, DumpSummary { written: 4, failed: 0 });
        for suffix in ["mask", "poly", "warped", "warped_mask"] {
            assert!(dir.join(format!("scene_{suffix}.png")).is_file(), "{suffix}");
        }
    }

    #[test]
    fn missing_stages_are_skipped() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dump = DebugDump::new(tmp.path());
        let img = BgrImage::filled(8, 8, [0, 0, 0]);
        let trace = DetectionTrace {
            mask: Some(GrayImage::new(8, 8)),
            ..DetectionTrace::default()
        };
        let summary = dump.write("empty", &img, &trace);
        assert_eq!(summary.written, 2);
        assert!(!tmp.path().join("empty_warped.png").exists());
    }

    #[test]
    fn unwritable_directory_is_reported_not_raised() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");
        let dump = DebugDump::new(blocker.join("sub"));
        let img = BgrImage::filled(8, 8, [0, 0, 0]);
        let summary = dump.write("x", &img, &trace_with_everything());
        assert_eq!(summary.written, 0);
        assert!(summary.failed > 0);
    }
}
