//! Adapters from `image`-crate buffers to the raw-frame input type.

use image::{GrayImage, RgbaImage};
use yomu_core::{ArgumentError, SourceImage};
use yomu_decode::DecoderResult;

use crate::error::Error;
use crate::reader::Yomu;

/// View a `GrayImage` as a decode input without copying.
pub fn source_from_gray(img: &GrayImage) -> Result<SourceImage<'_>, ArgumentError> {
    SourceImage::grayscale(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// View an `RgbaImage` as a decode input without copying.
pub fn source_from_rgba(img: &RgbaImage) -> Result<SourceImage<'_>, ArgumentError> {
    SourceImage::rgba(img.as_raw(), img.width() as usize, img.height() as usize)
}

impl Yomu {
    /// [`decode`](Yomu::decode) on an `image::GrayImage`.
    pub fn decode_gray_image(&self, img: &GrayImage) -> Result<DecoderResult, Error> {
        let source = source_from_gray(img).map_err(Error::Argument)?;
        self.decode(&source)
    }

    /// [`decode`](Yomu::decode) on an `image::RgbaImage`.
    pub fn decode_rgba_image(&self, img: &RgbaImage) -> Result<DecoderResult, Error> {
        let source = source_from_rgba(img).map_err(Error::Argument)?;
        self.decode(&source)
    }
}
