//! De-interleaving the raw codeword stream into error correction blocks.

use crate::error::DecodeError;
use crate::version::EcBlocks;

/// One error correction block: data codewords followed by parity.
#[derive(Clone, Debug)]
pub struct DataBlock {
    pub codewords: Vec<u8>,
    pub num_data_codewords: usize,
}

/// Split the interleaved codeword stream back into its blocks.
///
/// Blocks are interleaved codeword-by-codeword: data positions round-robin
/// across every block, the extra data codeword of the longer blocks next,
/// then parity round-robin. Shorter blocks come first in block order.
pub fn into_data_blocks(
    raw_codewords: &[u8],
    ec_blocks: &EcBlocks,
) -> Result<Vec<DataBlock>, DecodeError> {
    let ec_per_block = ec_blocks.ec_codewords_per_block;
    let expected = ec_blocks.total_data_codewords() + ec_blocks.total_ec_codewords();
    if raw_codewords.len() != expected {
        return Err(DecodeError::CodewordCountMismatch {
            got: raw_codewords.len(),
            expected,
        });
    }

    let mut blocks: Vec<DataBlock> = Vec::with_capacity(ec_blocks.num_blocks());
    for run in &ec_blocks.blocks {
        for _ in 0..run.count {
            blocks.push(DataBlock {
                codewords: vec![0; run.data_codewords + ec_per_block],
                num_data_codewords: run.data_codewords,
            });
        }
    }

    let short_data_len = blocks[0].num_data_codewords;
    let mut offset = 0usize;
    for i in 0..short_data_len {
        for block in blocks.iter_mut() {
            block.codewords[i] = raw_codewords[offset];
            offset += 1;
        }
    }
    for block in blocks.iter_mut() {
        if block.num_data_codewords > short_data_len {
            block.codewords[short_data_len] = raw_codewords[offset];
            offset += 1;
        }
    }
    for i in 0..ec_per_block {
        for block in blocks.iter_mut() {
            let position = block.num_data_codewords + i;
            block.codewords[position] = raw_codewords[offset];
            offset += 1;
        }
    }
    debug_assert_eq!(offset, raw_codewords.len());

    Ok(blocks)
}
