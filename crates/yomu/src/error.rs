//! The flat public error taxonomy.

use yomu_core::{ArgumentError, PrepError};
use yomu_decode::{DecodeError, QrDecodeError, ReedSolomonError};
use yomu_detect::DetectionError;

/// Discriminant of [`Error`], for callers that route on failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Argument,
    ImageProcessing,
    Detection,
    Decode,
    ReedSolomon,
}

/// Every failure the reader can produce, as one flat sum.
///
/// `Detection` means no symbol was found; `Decode` and `ReedSolomon` mean a
/// symbol was found but its content is unreadable.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    ImageProcessing(#[from] PrepError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    ReedSolomon(#[from] ReedSolomonError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Argument(_) => ErrorKind::Argument,
            Error::ImageProcessing(_) => ErrorKind::ImageProcessing,
            Error::Detection(_) => ErrorKind::Detection,
            Error::Decode(_) => ErrorKind::Decode,
            Error::ReedSolomon(_) => ErrorKind::ReedSolomon,
        }
    }
}

impl From<QrDecodeError> for Error {
    fn from(err: QrDecodeError) -> Self {
        match err {
            QrDecodeError::Decode(inner) => Error::Decode(inner),
            QrDecodeError::ReedSolomon(inner) => Error::ReedSolomon(inner),
        }
    }
}
