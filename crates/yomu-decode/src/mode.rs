//! Data segment modes and their per-version character count field widths.

use crate::version::Version;

/// Segment mode, as encoded by the 4-bit indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Terminator,
    Numeric,
    Alphanumeric,
    StructuredAppend,
    Byte,
    Eci,
    Kanji,
    Fnc1First,
    Fnc1Second,
    Hanzi,
}

impl Mode {
    /// Decode a 4-bit mode indicator.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Terminator),
            0x1 => Some(Self::Numeric),
            0x2 => Some(Self::Alphanumeric),
            0x3 => Some(Self::StructuredAppend),
            0x4 => Some(Self::Byte),
            0x5 => Some(Self::Fnc1First),
            0x7 => Some(Self::Eci),
            0x8 => Some(Self::Kanji),
            0x9 => Some(Self::Fnc1Second),
            0xD => Some(Self::Hanzi),
            _ => None,
        }
    }

    /// The 4-bit indicator for this mode.
    pub fn bits(self) -> u32 {
        match self {
            Self::Terminator => 0x0,
            Self::Numeric => 0x1,
            Self::Alphanumeric => 0x2,
            Self::StructuredAppend => 0x3,
            Self::Byte => 0x4,
            Self::Fnc1First => 0x5,
            Self::Eci => 0x7,
            Self::Kanji => 0x8,
            Self::Fnc1Second => 0x9,
            Self::Hanzi => 0xD,
        }
    }

    /// Width of the character count field for this mode in the given
    /// version. Zero for modes without a count field.
    pub fn character_count_bits(self, version: Version) -> usize {
        let triple = match self {
            Self::Numeric => [10, 12, 14],
            Self::Alphanumeric => [9, 11, 13],
            Self::Byte => [8, 16, 16],
            Self::Kanji | Self::Hanzi => [8, 10, 12],
            _ => return 0,
        };
        let band = match version.number() {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        triple[band]
    }
}
