use std::path::{Path, PathBuf};

use colorgrid_core::BgrImage;
use colorgrid_marker::{DetectError, DetectionResult, MarkerDetector};
use image::{ImageReader, RgbImage};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::debug_dump::DebugDump;

/// Failure to turn a file into a BGR image.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Errors of the file-level helpers.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Detect(#[from] DetectError),
}

/// Reorder an RGB image into the BGR layout used by the detector.
pub fn bgr_from_rgb(img: &RgbImage) -> BgrImage {
    let mut data = img.as_raw().clone();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    BgrImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data,
    }
}

/// Inverse of [`bgr_from_rgb`], for writing images with the `image` crate.
pub fn rgb_from_bgr(img: &BgrImage) -> RgbImage {
    let mut data = img.data.clone();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    // BgrImage keeps width*height*3 bytes, so this only fails on a malformed value.
    RgbImage::from_raw(img.width as u32, img.height as u32, data)
        .unwrap_or_else(|| RgbImage::new(img.width as u32, img.height as u32))
}

/// Decode any format supported by `image` (format guessed from content) into BGR.
pub fn load_bgr(path: impl AsRef<Path>) -> Result<BgrImage, LoadError> {
    let path = path.as_ref();
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decoded = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bgr_from_rgb(&decoded.to_rgb8()))
}

/// Load an image file and run the detector on it once.
///
/// When `dump` is given, intermediate images are written next to each other
/// under its directory using the file stem as prefix.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))
)]
pub fn detect_path(
    path: impl AsRef<Path>,
    detector: &MarkerDetector,
    dump: Option<&DebugDump>,
) -> Result<Option<DetectionResult>, PipelineError> {
    let path = path.as_ref();
    let img = load_bgr(path)?;
    debug!("{}: {}x{}", path.display(), img.width, img.height);

    let Some(dump) = dump else {
        return Ok(detector.detect(&img.view())?);
    };
    let (result, trace) = detector.detect_traced(&img.view())?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dump.write(&stem, &img, &trace);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rgb_and_bgr_swap_channels() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([10, 20, 30]));
        rgb.put_pixel(1, 0, Rgb([255, 0, 0]));
        let bgr = bgr_from_rgb(&rgb);
        assert_eq!(bgr.pixel(0, 0), [30, 20, 10]);
        assert_eq!(bgr.pixel(1, 0), [0, 0, 255]);
        assert_eq!(rgb_from_bgr(&bgr), rgb);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_bgr("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }), "{err}");
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noise.png");
        std::fs::write(&path, b"not an image at all").expect("write");
        let err = load_bgr(&path).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }), "{err}");
    }
}
