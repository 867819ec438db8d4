/// Errors raised while validating caller-supplied pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("row stride {stride} below minimum {min} for width {width}")]
    StrideTooSmall {
        stride: usize,
        min: usize,
        width: usize,
    },

    #[error("pixel buffer too small (expected at least {expected} bytes, got {got})")]
    BufferTooSmall { expected: usize, got: usize },

    #[error("binarizer threshold {value} outside (0, 1)")]
    ThresholdOutOfRange { value: f64 },
}

/// Errors raised by the luminance preparation stage itself.
///
/// Input validation happens at [`crate::SourceImage`] construction; this
/// covers failures of the downsampling step on degenerate aspect ratios.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PrepError {
    #[error("downsampled output collapsed to zero size (scale {scale}, input {width}x{height})")]
    DegenerateScale {
        scale: usize,
        width: usize,
        height: usize,
    },
}
