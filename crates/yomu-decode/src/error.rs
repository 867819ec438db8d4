/// Errors raised while parsing the sampled symbol grid or its bit stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("sampled grid dimension {dimension} is not a valid symbol size")]
    InvalidDimension { dimension: usize },

    #[error("format information could not be corrected")]
    FormatInformation,

    #[error("version information could not be corrected")]
    VersionInformation,

    #[error("codeword walk produced {got} codewords, expected {expected}")]
    CodewordCountMismatch { got: usize, expected: usize },

    #[error("unknown mode indicator {bits:#06b}")]
    InvalidMode { bits: u32 },

    #[error("bit stream ended inside a segment")]
    TruncatedStream,

    #[error("segment payload is malformed")]
    MalformedSegment,

    #[error("unsupported ECI designator {value}")]
    UnsupportedEci { value: u32 },
}

/// Errors raised when error correction is exhausted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReedSolomonError {
    #[error("error locator degree {degree} does not match {roots} located roots")]
    DegreeMismatch { degree: usize, roots: usize },

    #[error("error position outside the block")]
    BadErrorLocation,
}

/// Combined failure of the symbol decoding stage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QrDecodeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    ReedSolomon(#[from] ReedSolomonError),
}
