//! High-level façade crate for the `yomu-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the pipeline crates
//! - the [`Yomu`] reader: configuration presets, the detection retry
//!   ladder, and the flat error taxonomy
//! - (feature-gated) adapters for `image`-crate buffers
//!
//! ```no_run
//! use yomu::{SourceImage, Yomu};
//!
//! # fn main() -> Result<(), yomu::Error> {
//! # let (pixels, width, height) = (vec![0u8; 16], 4, 4);
//! let reader = Yomu::qr_only();
//! let frame = SourceImage::grayscale(&pixels, width, height)?;
//! let result = reader.decode(&frame)?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub use yomu_core as core;
pub use yomu_decode as decoding;
pub use yomu_detect as detection;

mod error;
mod reader;

#[cfg(feature = "image")]
pub mod image_interop;

pub use error::{Error, ErrorKind};
pub use reader::{BarcodeScanner, LinearScanner, Yomu, YomuConfig};

pub use yomu_core::{
    luminance_from_argb, BitMatrix, Luminance, PixelFormat, SourceImage,
};
pub use yomu_decode::{DecoderResult, ErrorCorrectionLevel, StructuredAppend};
