use colorgrid_core::{GeometryError, ImageLayoutError};
use thiserror::Error;

/// Contract violations reported by the detector.
///
/// A marker that simply is not in the image is *not* an error; detection then
/// returns `Ok(None)`.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("empty image (width={width}, height={height})")]
    EmptyImage { width: usize, height: usize },
    #[error("invalid BGR buffer (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl From<ImageLayoutError> for DetectError {
    fn from(err: ImageLayoutError) -> Self {
        match err {
            ImageLayoutError::Empty { width, height } => Self::EmptyImage { width, height },
            ImageLayoutError::BufferLength { expected, got } => {
                Self::InvalidBuffer { expected, got }
            }
        }
    }
}
