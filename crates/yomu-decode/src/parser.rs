//! Reading format, version and codewords out of the sampled module grid.

use yomu_core::BitMatrix;

use crate::data_mask;
use crate::error::DecodeError;
use crate::format::FormatInformation;
use crate::version::Version;

/// Parser over one sampled `dimension × dimension` grid.
pub struct BitMatrixParser {
    bits: BitMatrix,
    dimension: usize,
}

impl BitMatrixParser {
    pub fn new(bits: BitMatrix) -> Result<Self, DecodeError> {
        let dimension = bits.height();
        if dimension < 21 || dimension % 4 != 1 || bits.width() != dimension {
            return Err(DecodeError::InvalidDimension { dimension });
        }
        Ok(Self { bits, dimension })
    }

    #[inline]
    fn copy_bit(&self, x: usize, y: usize, bits: u32) -> u32 {
        if self.bits.get(x, y) {
            (bits << 1) | 0x1
        } else {
            bits << 1
        }
    }

    /// Read both 15-bit format copies and decode them jointly.
    pub fn read_format_information(&self) -> Result<FormatInformation, DecodeError> {
        // Copy 1, around the top-left finder pattern.
        let mut format_bits1 = 0u32;
        for x in 0..6 {
            format_bits1 = self.copy_bit(x, 8, format_bits1);
        }
        format_bits1 = self.copy_bit(7, 8, format_bits1);
        format_bits1 = self.copy_bit(8, 8, format_bits1);
        format_bits1 = self.copy_bit(8, 7, format_bits1);
        for y in (0..6).rev() {
            format_bits1 = self.copy_bit(8, y, format_bits1);
        }

        // Copy 2, split between the bottom-left and top-right corners.
        let dimension = self.dimension;
        let mut format_bits2 = 0u32;
        for y in ((dimension - 7)..dimension).rev() {
            format_bits2 = self.copy_bit(8, y, format_bits2);
        }
        for x in (dimension - 8)..dimension {
            format_bits2 = self.copy_bit(x, 8, format_bits2);
        }

        FormatInformation::decode(format_bits1, format_bits2)
    }

    /// Determine the version: below 45 modules it follows from the
    /// dimension, otherwise the two redundant 18-bit fields decide.
    pub fn read_version(&self) -> Result<Version, DecodeError> {
        let dimension = self.dimension;
        if dimension < 45 {
            return Version::for_dimension(dimension);
        }

        // Top-right block, columns dim-11..dim-9, rows 0..5.
        let ij_min = dimension - 11;
        let mut version_bits = 0u32;
        for y in (0..6).rev() {
            for x in (ij_min..=dimension - 9).rev() {
                version_bits = self.copy_bit(x, y, version_bits);
            }
        }
        if let Some(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                return Ok(version);
            }
        }

        // Bottom-left block, mirrored layout.
        let mut version_bits = 0u32;
        for x in (0..6).rev() {
            for y in (ij_min..=dimension - 9).rev() {
                version_bits = self.copy_bit(x, y, version_bits);
            }
        }
        if let Some(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                return Ok(version);
            }
        }
        Err(DecodeError::VersionInformation)
    }

    /// Remove the data mask and walk the zigzag, returning the raw
    /// codewords in symbol order.
    pub fn read_codewords(
        &mut self,
        version: Version,
        data_mask: u8,
    ) -> Result<Vec<u8>, DecodeError> {
        let dimension = self.dimension;
        data_mask::unmask(&mut self.bits, dimension, data_mask);

        let function_pattern = version.build_function_pattern();
        let total = version.total_codewords();
        let mut codewords = Vec::with_capacity(total);
        let mut current_byte = 0u32;
        let mut bits_read = 0u8;
        let mut reading_up = true;

        let mut right = dimension as isize - 1;
        while right > 0 {
            if right == 6 {
                // The vertical timing column is skipped entirely.
                right -= 1;
            }
            for count in 0..dimension {
                let y = if reading_up { dimension - 1 - count } else { count };
                for col in 0..2 {
                    let x = (right as usize) - col;
                    if function_pattern.get(x, y) {
                        continue;
                    }
                    bits_read += 1;
                    current_byte <<= 1;
                    if self.bits.get(x, y) {
                        current_byte |= 1;
                    }
                    if bits_read == 8 {
                        codewords.push(current_byte as u8);
                        bits_read = 0;
                        current_byte = 0;
                    }
                }
            }
            reading_up = !reading_up;
            right -= 2;
        }

        if codewords.len() != total {
            return Err(DecodeError::CodewordCountMismatch {
                got: codewords.len(),
                expected: total,
            });
        }
        Ok(codewords)
    }
}
