//! Composition of the symbol decoding stages.

use log::debug;
use yomu_core::BitMatrix;

use crate::bitstream::{parse_bit_stream, DecoderResult};
use crate::blocks::into_data_blocks;
use crate::error::QrDecodeError;
use crate::parser::BitMatrixParser;
use crate::reed_solomon::ReedSolomonDecoder;

/// Decode one sampled symbol grid into text.
///
/// Format and version are read first, the mask removed, codewords walked
/// out, de-interleaved and Reed-Solomon corrected block by block, and the
/// surviving data codewords parsed as a mode bit stream.
pub fn decode(bits: BitMatrix) -> Result<DecoderResult, QrDecodeError> {
    let mut parser = BitMatrixParser::new(bits).map_err(QrDecodeError::Decode)?;
    let format = parser.read_format_information().map_err(QrDecodeError::Decode)?;
    let version = parser.read_version().map_err(QrDecodeError::Decode)?;

    let raw_codewords = parser
        .read_codewords(version, format.data_mask)
        .map_err(QrDecodeError::Decode)?;

    let ec_blocks = version.ec_blocks(format.ec_level);
    let blocks = into_data_blocks(&raw_codewords, &ec_blocks).map_err(QrDecodeError::Decode)?;

    let rs = ReedSolomonDecoder::new();
    let mut data = Vec::with_capacity(ec_blocks.total_data_codewords());
    let mut corrected_total = 0usize;
    for mut block in blocks {
        let ec_count = block.codewords.len() - block.num_data_codewords;
        corrected_total += rs
            .correct(&mut block.codewords, ec_count)
            .map_err(QrDecodeError::ReedSolomon)?;
        data.extend_from_slice(&block.codewords[..block.num_data_codewords]);
    }
    if corrected_total > 0 {
        debug!(
            "corrected {corrected_total} codeword error(s) in version {} symbol",
            version.number()
        );
    }

    parse_bit_stream(&data, version, Some(format.ec_level)).map_err(QrDecodeError::Decode)
}
