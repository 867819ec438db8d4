/// Errors raised while locating a QR symbol in the binarized image.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("only {found} finder pattern(s) survived cross-checking")]
    TooFewFinderPatterns { found: usize },

    #[error("no three finder patterns form a valid corner triple")]
    NoValidTriplet,

    #[error("estimated module size too small")]
    ModuleSizeTooSmall,

    #[error("estimated symbol dimension {dimension} outside 21..=177")]
    DimensionOutOfRange { dimension: i32 },

    #[error("no QR code or barcode found")]
    NothingFound,
}
