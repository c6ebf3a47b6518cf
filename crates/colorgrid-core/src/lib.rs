//! Core types and utilities for color-grid marker detection.
//!
//! This crate is intentionally small and purely geometric. It owns the borrowed
//! BGR image view used across the workspace, projective warping, and the polygon
//! helpers (ordering, area, convexity, hull) shared by every pipeline stage.
//! It does *not* depend on any concrete image decoding library.

mod geometry;
mod homography;
mod image;
mod logger;

pub use geometry::{
    convex_hull, coverage_percent, is_convex, is_degenerate_quad, order_clockwise_from_top_left,
    polygon_area, signed_polygon_area, GeometryError,
};
pub use homography::{homography_from_4pt, warp_perspective_bgr, Homography};
pub use image::{
    sample_bilinear_bgr, sample_bilinear_bgr_u8, BgrImage, BgrImageView, ImageLayoutError,
    BGR_CHANNELS,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_for_verbosity};
