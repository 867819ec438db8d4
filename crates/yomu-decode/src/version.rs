//! Version metadata: symbol geometry, alignment centers and error
//! correction block structure for versions 1–40.

use yomu_core::BitMatrix;

use crate::error::DecodeError;
use crate::format::ErrorCorrectionLevel;

/// BCH(18,6) codewords protecting the version field, for versions 7..=40.
const VERSION_DECODE_INFO: [u32; 34] = [
    0x07C94, 0x085BC, 0x09A99, 0x0A4D3, 0x0BBF6, 0x0C762, 0x0D847, 0x0E60D, 0x0F928, 0x10B78,
    0x1145D, 0x12A17, 0x13532, 0x149A6, 0x15683, 0x168C9, 0x177EC, 0x18EC4, 0x191E1, 0x1AFAB,
    0x1B08E, 0x1CC1A, 0x1D33F, 0x1ED75, 0x1F250, 0x209D5, 0x216F0, 0x228BA, 0x2379F, 0x24B0B,
    0x2542E, 0x26A64, 0x27541, 0x28C69,
];

/// EC codewords per block, indexed `[level ordinal][version]` (entry 0 is a
/// placeholder).
const EC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    // L
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    // M
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    // Q
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    // H
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

/// Number of error correction blocks, same indexing.
const NUM_EC_BLOCKS: [[i8; 41]; 4] = [
    // L
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    // M
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    // Q
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    // H
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

/// One run of equally sized error correction blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcBlockCount {
    pub count: usize,
    pub data_codewords: usize,
}

/// The block structure of one version at one error correction level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcBlocks {
    pub ec_codewords_per_block: usize,
    /// Shorter blocks first, matching the interleaving order.
    pub blocks: Vec<EcBlockCount>,
}

impl EcBlocks {
    pub fn num_blocks(&self) -> usize {
        self.blocks.iter().map(|b| b.count).sum()
    }

    pub fn total_data_codewords(&self) -> usize {
        self.blocks.iter().map(|b| b.count * b.data_codewords).sum()
    }

    pub fn total_ec_codewords(&self) -> usize {
        self.ec_codewords_per_block * self.num_blocks()
    }
}

/// A QR symbol version (1..=40).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u8);

impl Version {
    pub fn new(number: u8) -> Option<Self> {
        (1..=40).contains(&number).then_some(Self(number))
    }

    /// The version whose symbol is `dimension` modules wide.
    pub fn for_dimension(dimension: usize) -> Result<Self, DecodeError> {
        if dimension < 21 || dimension % 4 != 1 {
            return Err(DecodeError::InvalidDimension { dimension });
        }
        Self::new(((dimension - 17) / 4) as u8)
            .ok_or(DecodeError::InvalidDimension { dimension })
    }

    /// Fuzzy-decode an 18-bit version field; up to 3 bit errors are
    /// tolerated, distance 4 and beyond is rejected.
    pub fn decode_version_information(version_bits: u32) -> Option<Self> {
        let mut best_difference = u32::MAX;
        let mut best_version = 0u8;
        for (index, &target) in VERSION_DECODE_INFO.iter().enumerate() {
            if target == version_bits {
                return Self::new(index as u8 + 7);
            }
            let difference = (version_bits ^ target).count_ones();
            if difference < best_difference {
                best_difference = difference;
                best_version = index as u8 + 7;
            }
        }
        if best_difference <= 3 {
            return Self::new(best_version);
        }
        None
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn dimension(self) -> usize {
        17 + 4 * self.0 as usize
    }

    /// Total codewords in the symbol, derived from the raw module count.
    pub fn total_codewords(self) -> usize {
        let v = self.0 as usize;
        let mut modules = (16 * v + 128) * v + 64;
        if v >= 2 {
            let num_align = v / 7 + 2;
            modules -= (25 * num_align - 10) * num_align - 55;
            if v >= 7 {
                modules -= 36;
            }
        }
        modules / 8
    }

    /// Alignment pattern center coordinates, ascending. Empty for version 1.
    pub fn alignment_pattern_centers(self) -> Vec<usize> {
        let v = self.0 as usize;
        if v == 1 {
            return Vec::new();
        }
        let num_align = v / 7 + 2;
        let step = if v == 32 {
            26
        } else {
            (v * 4 + num_align * 2 + 1) / (2 * num_align - 2) * 2
        };
        let mut centers = vec![6usize];
        let mut pos = v * 4 + 10;
        for _ in 0..num_align - 1 {
            centers.insert(1, pos);
            pos -= step;
        }
        centers
    }

    /// Error correction block structure for one level, shorter blocks
    /// first. Fully determined by the codeword total and the per-level
    /// block count and parity size.
    pub fn ec_blocks(self, level: ErrorCorrectionLevel) -> EcBlocks {
        let v = self.0 as usize;
        let ordinal = level.ordinal();
        let ec_per_block = EC_CODEWORDS_PER_BLOCK[ordinal][v] as usize;
        let num_blocks = NUM_EC_BLOCKS[ordinal][v] as usize;

        let data_total = self.total_codewords() - ec_per_block * num_blocks;
        let short_len = data_total / num_blocks;
        let num_long = data_total % num_blocks;

        let mut blocks = Vec::with_capacity(2);
        if num_blocks > num_long {
            blocks.push(EcBlockCount {
                count: num_blocks - num_long,
                data_codewords: short_len,
            });
        }
        if num_long > 0 {
            blocks.push(EcBlockCount {
                count: num_long,
                data_codewords: short_len + 1,
            });
        }
        EcBlocks {
            ec_codewords_per_block: ec_per_block,
            blocks,
        }
    }

    /// Bitmap of every function module (finder patterns and separators,
    /// format and version areas, timing patterns, alignment patterns): the
    /// modules the codeword walk must step over.
    pub fn build_function_pattern(self) -> BitMatrix {
        let dimension = self.dimension();
        let mut bits = BitMatrix::new(dimension, dimension);

        // Finder patterns with separators and format information.
        bits.set_region(0, 0, 9, 9);
        bits.set_region(dimension - 8, 0, 8, 9);
        bits.set_region(0, dimension - 8, 9, 8);

        // Alignment patterns, skipping the three finder corners.
        let centers = self.alignment_pattern_centers();
        let max = centers.len();
        for (xi, &cx) in centers.iter().enumerate() {
            for (yi, &cy) in centers.iter().enumerate() {
                let corner = (xi == 0 && (yi == 0 || yi == max - 1)) || (xi == max - 1 && yi == 0);
                if !corner {
                    bits.set_region(cx - 2, cy - 2, 5, 5);
                }
            }
        }

        // Timing patterns.
        bits.set_region(6, 9, 1, dimension - 17);
        bits.set_region(9, 6, dimension - 17, 1);

        if self.0 >= 7 {
            bits.set_region(dimension - 11, 0, 3, 6);
            bits.set_region(0, dimension - 11, 6, 3);
        }

        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_grows_four_per_version() {
        assert_eq!(Version::new(1).unwrap().dimension(), 21);
        assert_eq!(Version::new(7).unwrap().dimension(), 45);
        assert_eq!(Version::new(40).unwrap().dimension(), 177);
        assert!(Version::new(0).is_none());
        assert!(Version::new(41).is_none());
    }

    #[test]
    fn for_dimension_accepts_only_valid_sizes() {
        assert_eq!(Version::for_dimension(21).unwrap().number(), 1);
        assert_eq!(Version::for_dimension(177).unwrap().number(), 40);
        assert!(Version::for_dimension(20).is_err());
        assert!(Version::for_dimension(13).is_err());
        assert!(Version::for_dimension(181).is_err());
    }

    #[test]
    fn known_codeword_totals() {
        // Reference totals from the symbol capacity table.
        for (version, expected) in [(1u8, 26), (2, 44), (5, 134), (7, 196), (10, 346), (40, 3706)]
        {
            assert_eq!(Version::new(version).unwrap().total_codewords(), expected);
        }
    }

    #[test]
    fn alignment_centers_match_reference_rows() {
        assert!(Version::new(1).unwrap().alignment_pattern_centers().is_empty());
        assert_eq!(Version::new(2).unwrap().alignment_pattern_centers(), vec![6, 18]);
        assert_eq!(Version::new(7).unwrap().alignment_pattern_centers(), vec![6, 22, 38]);
        assert_eq!(
            Version::new(32).unwrap().alignment_pattern_centers(),
            vec![6, 34, 60, 86, 112, 138]
        );
        assert_eq!(
            Version::new(40).unwrap().alignment_pattern_centers(),
            vec![6, 30, 58, 86, 114, 142, 170]
        );
    }

    #[test]
    fn ec_blocks_partition_the_codeword_budget() {
        use ErrorCorrectionLevel::*;
        for v in 1..=40u8 {
            let version = Version::new(v).unwrap();
            for level in [L, M, Q, H] {
                let blocks = version.ec_blocks(level);
                assert_eq!(
                    blocks.total_data_codewords() + blocks.total_ec_codewords(),
                    version.total_codewords(),
                    "version {v} level {level:?}"
                );
                // Long blocks carry exactly one extra data codeword.
                if blocks.blocks.len() == 2 {
                    assert_eq!(
                        blocks.blocks[1].data_codewords,
                        blocks.blocks[0].data_codewords + 1
                    );
                }
            }
        }
    }

    #[test]
    fn version_five_quartile_splits_like_the_standard() {
        let blocks = Version::new(5).unwrap().ec_blocks(ErrorCorrectionLevel::Q);
        assert_eq!(blocks.ec_codewords_per_block, 18);
        assert_eq!(
            blocks.blocks,
            vec![
                EcBlockCount { count: 2, data_codewords: 15 },
                EcBlockCount { count: 2, data_codewords: 16 },
            ]
        );
    }

    #[test]
    fn version_information_tolerates_three_errors() {
        for (index, &code) in VERSION_DECODE_INFO.iter().enumerate() {
            let number = index as u8 + 7;
            assert_eq!(
                Version::decode_version_information(code).unwrap().number(),
                number
            );
            let three_flipped = code ^ 0b10_0000_0001_0000_0001;
            assert_eq!(
                Version::decode_version_information(three_flipped)
                    .unwrap()
                    .number(),
                number,
                "version {number}"
            );
        }
        // All-ones is at distance 18 - weight(code) >= 4 from every
        // codeword: reject.
        for &code in &VERSION_DECODE_INFO {
            assert!(code.count_ones() <= 14);
        }
        assert!(Version::decode_version_information(0x3FFFF).is_none());
    }

    #[test]
    fn function_pattern_reserves_expected_module_count() {
        // Version 1: 3 * 81 (finder+format) + 2 * 5 (timing) - overlap 0
        // minus the separator double counts... just assert the exact count
        // of data modules instead: 26 codewords * 8 = 208 data bits, and
        // the symbol has 21 * 21 = 441 modules.
        let version = Version::new(1).unwrap();
        let pattern = version.build_function_pattern();
        let mut function_modules = 0usize;
        for y in 0..21 {
            for x in 0..21 {
                if pattern.get(x, y) {
                    function_modules += 1;
                }
            }
        }
        assert_eq!(441 - function_modules, version.total_codewords() * 8);
    }

    #[test]
    fn function_pattern_covers_remainder_bits_for_larger_versions() {
        // Version 2 has 7 remainder bits that never form a codeword.
        let version = Version::new(2).unwrap();
        let pattern = version.build_function_pattern();
        let dimension = version.dimension();
        let mut data_modules = 0usize;
        for y in 0..dimension {
            for x in 0..dimension {
                if !pattern.get(x, y) {
                    data_modules += 1;
                }
            }
        }
        assert_eq!(data_modules, version.total_codewords() * 8 + 7);
    }
}
