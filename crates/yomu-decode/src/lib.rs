//! Symbol decoding for the yomu QR pipeline: format and version parsing,
//! data mask removal, Reed-Solomon correction over GF(256) and bit-stream
//! text extraction.

mod bit_source;
mod bitstream;
mod blocks;
mod data_mask;
mod decoder;
mod error;
mod format;
mod gf256;
mod mode;
mod parser;
mod reed_solomon;
mod version;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use bit_source::BitSource;
pub use bitstream::{parse_bit_stream, DecoderResult, StructuredAppend};
pub use blocks::{into_data_blocks, DataBlock};
pub use data_mask::{is_masked, unmask};
pub use decoder::decode;
pub use error::{DecodeError, QrDecodeError, ReedSolomonError};
pub use format::{ErrorCorrectionLevel, FormatInformation};
pub use gf256::Gf256;
pub use mode::Mode;
pub use parser::BitMatrixParser;
pub use reed_solomon::ReedSolomonDecoder;
pub use version::{EcBlockCount, EcBlocks, Version};
