//! Shared data structures and the luminance → monochrome front half of the
//! yomu QR decoding pipeline.
//!
//! This crate is intentionally free of geometry and symbol knowledge: it
//! turns caller-supplied pixel buffers into packed [`BitMatrix`] bitmaps
//! and nothing more.

mod binarize;
mod bitmatrix;
mod error;
mod histogram;
mod luminance;

pub use binarize::{binarize, DEFAULT_THRESHOLD_FACTOR};
pub use bitmatrix::BitMatrix;
pub use error::{ArgumentError, PrepError};
pub use histogram::{binarize_global, bucketize, estimate_black_point, BUCKET_COUNT};
pub use luminance::{
    luminance_from_argb, Luminance, PixelFormat, SourceImage, TARGET_PIXELS,
};
