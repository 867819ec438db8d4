//! Format information: the BCH(15,5)-protected field holding the error
//! correction level and data mask pattern.

use crate::error::DecodeError;

/// XOR mask applied to format information so it is never all-zero.
const FORMAT_INFO_MASK: u32 = 0x5412;

/// All 32 masked BCH(15,5) codewords, paired with their 5 data bits
/// (EC level bits in the high 2, mask pattern in the low 3).
const FORMAT_INFO_DECODE_LOOKUP: [(u32, u32); 32] = [
    (0x5412, 0x00),
    (0x5125, 0x01),
    (0x5E7C, 0x02),
    (0x5B4B, 0x03),
    (0x45F9, 0x04),
    (0x40CE, 0x05),
    (0x4F97, 0x06),
    (0x4AA0, 0x07),
    (0x77C4, 0x08),
    (0x72F3, 0x09),
    (0x7DAA, 0x0A),
    (0x789D, 0x0B),
    (0x662F, 0x0C),
    (0x6318, 0x0D),
    (0x6C41, 0x0E),
    (0x6976, 0x0F),
    (0x1689, 0x10),
    (0x13BE, 0x11),
    (0x1CE7, 0x12),
    (0x19D0, 0x13),
    (0x0762, 0x14),
    (0x0255, 0x15),
    (0x0D0C, 0x16),
    (0x083B, 0x17),
    (0x355F, 0x18),
    (0x3068, 0x19),
    (0x3F31, 0x1A),
    (0x3A06, 0x1B),
    (0x24B4, 0x1C),
    (0x2183, 0x1D),
    (0x2EDA, 0x1E),
    (0x2BED, 0x1F),
];

/// QR error correction level with its standard 2-bit encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCorrectionLevel {
    /// ~7% recovery.
    L,
    /// ~15% recovery.
    M,
    /// ~25% recovery.
    Q,
    /// ~30% recovery.
    H,
}

impl ErrorCorrectionLevel {
    /// Decode the 2-bit field as stored in format information.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits & 0x03 {
            0x00 => Some(Self::M),
            0x01 => Some(Self::L),
            0x02 => Some(Self::H),
            0x03 => Some(Self::Q),
            _ => unreachable!(),
        }
    }

    /// The 2-bit encoding used in format information.
    pub fn bits(self) -> u32 {
        match self {
            Self::M => 0x00,
            Self::L => 0x01,
            Self::H => 0x02,
            Self::Q => 0x03,
        }
    }

    /// Index into the per-level capacity tables (L, M, Q, H order).
    pub(crate) fn ordinal(self) -> usize {
        match self {
            Self::L => 0,
            Self::M => 1,
            Self::Q => 2,
            Self::H => 3,
        }
    }
}

/// Decoded format information.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatInformation {
    pub ec_level: ErrorCorrectionLevel,
    pub data_mask: u8,
}

impl FormatInformation {
    /// Decode from the two redundant 15-bit reads.
    ///
    /// The copy closest to a valid codeword wins; up to 3 bit errors are
    /// tolerated. Some symbols in the wild forget the XOR mask, so an
    /// unmasked interpretation is attempted before giving up.
    pub fn decode(masked1: u32, masked2: u32) -> Result<Self, DecodeError> {
        Self::do_decode(masked1, masked2)
            .or_else(|| {
                Self::do_decode(masked1 ^ FORMAT_INFO_MASK, masked2 ^ FORMAT_INFO_MASK)
            })
            .ok_or(DecodeError::FormatInformation)
    }

    fn do_decode(info1: u32, info2: u32) -> Option<Self> {
        let mut best_difference = u32::MAX;
        let mut best_bits = 0u32;
        for &(masked, data_bits) in &FORMAT_INFO_DECODE_LOOKUP {
            if info1 == masked || info2 == masked {
                return Self::from_data_bits(data_bits);
            }
            let mut difference = (info1 ^ masked).count_ones();
            if difference < best_difference {
                best_difference = difference;
                best_bits = data_bits;
            }
            if info1 != info2 {
                difference = (info2 ^ masked).count_ones();
                if difference < best_difference {
                    best_difference = difference;
                    best_bits = data_bits;
                }
            }
        }
        if best_difference <= 3 {
            return Self::from_data_bits(best_bits);
        }
        None
    }

    fn from_data_bits(data_bits: u32) -> Option<Self> {
        Some(Self {
            ec_level: ErrorCorrectionLevel::from_bits(data_bits >> 3)?,
            data_mask: (data_bits & 0x07) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ec_level_bits_round_trip() {
        for level in [
            ErrorCorrectionLevel::L,
            ErrorCorrectionLevel::M,
            ErrorCorrectionLevel::Q,
            ErrorCorrectionLevel::H,
        ] {
            assert_eq!(ErrorCorrectionLevel::from_bits(level.bits()), Some(level));
        }
        assert_eq!(ErrorCorrectionLevel::from_bits(0x01), Some(ErrorCorrectionLevel::L));
    }

    #[test]
    fn exact_codewords_decode() {
        for &(masked, data_bits) in &FORMAT_INFO_DECODE_LOOKUP {
            let info = FormatInformation::decode(masked, masked).expect("decode");
            assert_eq!(info.data_mask as u32, data_bits & 0x07);
            assert_eq!(info.ec_level.bits(), data_bits >> 3);
        }
    }

    #[test]
    fn three_bit_errors_are_corrected() {
        // 0x77C4 carries data bits 0x08: level L, mask pattern 0.
        let reference = FormatInformation::decode(0x77C4, 0x77C4).unwrap();
        assert_eq!(reference.ec_level, ErrorCorrectionLevel::L);
        assert_eq!(reference.data_mask, 0);
        let corrupted = 0x77C4 ^ 0b0000_0100_0100_0001;
        assert_eq!(FormatInformation::decode(corrupted, corrupted).unwrap(), reference);
    }

    #[test]
    fn four_errors_never_decode_to_the_original() {
        for &(masked, data_bits) in &FORMAT_INFO_DECODE_LOOKUP {
            let corrupted = masked ^ 0b1111;
            match FormatInformation::decode(corrupted, corrupted) {
                Ok(info) => assert_ne!(
                    (info.ec_level.bits() << 3) | info.data_mask as u32,
                    data_bits,
                    "corrupted {masked:#06x} decoded back to its own data"
                ),
                Err(DecodeError::FormatInformation) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn second_copy_rescues_first() {
        let garbage = 0x2A7F;
        let good = 0x5412;
        assert!(FormatInformation::decode(garbage, good).is_ok());
    }
}
