//! Turning corrected data codewords into text: the mode state machine.

use encoding_rs::Encoding;

use crate::bit_source::BitSource;
use crate::error::DecodeError;
use crate::format::ErrorCorrectionLevel;
use crate::mode::Mode;
use crate::version::Version;

const ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";
const GB2312_SUBSET: u32 = 1;
/// Group separator substituted for FNC1's '%' escape.
const GS: char = '\u{1D}';

/// Structured-append header carried through as metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructuredAppend {
    pub sequence: u8,
    pub parity: u8,
}

/// Output of one decoded symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderResult {
    pub text: String,
    /// Raw contents of each byte-mode segment, in stream order.
    pub byte_segments: Vec<Vec<u8>>,
    pub ec_level: Option<ErrorCorrectionLevel>,
    pub structured_append: Option<StructuredAppend>,
}

/// Decode the full bit stream of one symbol.
pub fn parse_bit_stream(
    bytes: &[u8],
    version: Version,
    ec_level: Option<ErrorCorrectionLevel>,
) -> Result<DecoderResult, DecodeError> {
    let mut bits = BitSource::new(bytes);
    let mut text = String::new();
    let mut byte_segments: Vec<Vec<u8>> = Vec::new();
    let mut current_charset: Option<&'static Encoding> = None;
    let mut fnc1_in_effect = false;
    let mut structured_append = None;

    loop {
        if bits.available() < 4 {
            break;
        }
        let mode_bits = bits.read_bits(4)?;
        let mode = Mode::from_bits(mode_bits).ok_or(DecodeError::InvalidMode { bits: mode_bits })?;
        match mode {
            Mode::Terminator => break,
            Mode::Fnc1First | Mode::Fnc1Second => {
                fnc1_in_effect = true;
            }
            Mode::StructuredAppend => {
                if bits.available() < 16 {
                    return Err(DecodeError::TruncatedStream);
                }
                structured_append = Some(StructuredAppend {
                    sequence: bits.read_bits(8)? as u8,
                    parity: bits.read_bits(8)? as u8,
                });
            }
            Mode::Eci => {
                let value = parse_eci_designator(&mut bits)?;
                current_charset = Some(charset_for_eci(value)?);
            }
            Mode::Numeric => {
                let count = bits.read_bits(Mode::Numeric.character_count_bits(version))?;
                decode_numeric_segment(&mut bits, &mut text, count as usize)?;
            }
            Mode::Alphanumeric => {
                let count = bits.read_bits(Mode::Alphanumeric.character_count_bits(version))?;
                decode_alphanumeric_segment(&mut bits, &mut text, count as usize, fnc1_in_effect)?;
            }
            Mode::Byte => {
                let count = bits.read_bits(Mode::Byte.character_count_bits(version))?;
                decode_byte_segment(
                    &mut bits,
                    &mut text,
                    count as usize,
                    current_charset,
                    &mut byte_segments,
                )?;
            }
            Mode::Kanji => {
                let count = bits.read_bits(Mode::Kanji.character_count_bits(version))?;
                decode_kanji_segment(&mut bits, &mut text, count as usize)?;
            }
            Mode::Hanzi => {
                let subset = bits.read_bits(4)?;
                if subset != GB2312_SUBSET {
                    return Err(DecodeError::MalformedSegment);
                }
                let count = bits.read_bits(Mode::Hanzi.character_count_bits(version))?;
                decode_hanzi_segment(&mut bits, &mut text, count as usize)?;
            }
        }
    }

    Ok(DecoderResult {
        text,
        byte_segments,
        ec_level,
        structured_append,
    })
}

/// 1-, 2- or 3-byte ECI designator, selected by the leading bit pattern.
fn parse_eci_designator(bits: &mut BitSource<'_>) -> Result<u32, DecodeError> {
    let first = bits.read_bits(8)?;
    if first & 0x80 == 0 {
        return Ok(first & 0x7F);
    }
    if first & 0xC0 == 0x80 {
        let second = bits.read_bits(8)?;
        return Ok(((first & 0x3F) << 8) | second);
    }
    if first & 0xE0 == 0xC0 {
        let rest = bits.read_bits(16)?;
        return Ok(((first & 0x1F) << 16) | rest);
    }
    Err(DecodeError::MalformedSegment)
}

/// Map an ECI designator to a character set.
///
/// ISO-8859-1 family members missing from the WHATWG registry fall back to
/// their closest windows-* superset.
fn charset_for_eci(value: u32) -> Result<&'static Encoding, DecodeError> {
    use encoding_rs::*;
    Ok(match value {
        0..=3 | 27 | 170 => WINDOWS_1252,
        4 => ISO_8859_2,
        5 => ISO_8859_3,
        6 => ISO_8859_4,
        7 => ISO_8859_5,
        8 => ISO_8859_6,
        9 => ISO_8859_7,
        10 => ISO_8859_8,
        11 => WINDOWS_1254,
        12 => ISO_8859_10,
        13 => WINDOWS_874,
        15 => ISO_8859_13,
        16 => ISO_8859_14,
        17 => ISO_8859_15,
        18 => ISO_8859_16,
        20 => SHIFT_JIS,
        21 => WINDOWS_1250,
        22 => WINDOWS_1251,
        23 => WINDOWS_1252,
        24 => WINDOWS_1256,
        25 => UTF_16BE,
        26 => UTF_8,
        28 => BIG5,
        29 => GB18030,
        30 => EUC_KR,
        other => return Err(DecodeError::UnsupportedEci { value: other }),
    })
}

fn decode_numeric_segment(
    bits: &mut BitSource<'_>,
    text: &mut String,
    mut count: usize,
) -> Result<(), DecodeError> {
    while count >= 3 {
        let group = bits.read_bits(10)?;
        if group >= 1000 {
            return Err(DecodeError::MalformedSegment);
        }
        text.push(digit(group / 100));
        text.push(digit((group / 10) % 10));
        text.push(digit(group % 10));
        count -= 3;
    }
    if count == 2 {
        let group = bits.read_bits(7)?;
        if group >= 100 {
            return Err(DecodeError::MalformedSegment);
        }
        text.push(digit(group / 10));
        text.push(digit(group % 10));
    } else if count == 1 {
        let group = bits.read_bits(4)?;
        if group >= 10 {
            return Err(DecodeError::MalformedSegment);
        }
        text.push(digit(group));
    }
    Ok(())
}

#[inline]
fn digit(value: u32) -> char {
    (b'0' + value as u8) as char
}

fn decode_alphanumeric_segment(
    bits: &mut BitSource<'_>,
    text: &mut String,
    mut count: usize,
    fnc1_in_effect: bool,
) -> Result<(), DecodeError> {
    let start = text.len();
    while count > 1 {
        let pair = bits.read_bits(11)?;
        let (a, b) = (pair / 45, pair % 45);
        if a >= 45 {
            return Err(DecodeError::MalformedSegment);
        }
        text.push(ALPHANUMERIC_CHARS[a as usize] as char);
        text.push(ALPHANUMERIC_CHARS[b as usize] as char);
        count -= 2;
    }
    if count == 1 {
        let value = bits.read_bits(6)?;
        if value >= 45 {
            return Err(DecodeError::MalformedSegment);
        }
        text.push(ALPHANUMERIC_CHARS[value as usize] as char);
    }

    if fnc1_in_effect {
        // "%%" is a literal percent, a lone "%" becomes the GS separator.
        let decoded: String = text[start..].to_owned();
        text.truncate(start);
        let mut chars = decoded.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' {
                if chars.peek() == Some(&'%') {
                    chars.next();
                    text.push('%');
                } else {
                    text.push(GS);
                }
            } else {
                text.push(c);
            }
        }
    }
    Ok(())
}

fn decode_byte_segment(
    bits: &mut BitSource<'_>,
    text: &mut String,
    count: usize,
    charset: Option<&'static Encoding>,
    byte_segments: &mut Vec<Vec<u8>>,
) -> Result<(), DecodeError> {
    if bits.available() < 8 * count {
        return Err(DecodeError::TruncatedStream);
    }
    let mut bytes = Vec::with_capacity(count);
    for _ in 0..count {
        bytes.push(bits.read_bits(8)? as u8);
    }

    match charset {
        Some(encoding) => {
            let (decoded, _, had_errors) = encoding.decode(&bytes);
            if had_errors {
                return Err(DecodeError::MalformedSegment);
            }
            text.push_str(&decoded);
        }
        None => match guess_utf8(&bytes) {
            Some(decoded) => text.push_str(decoded),
            // Default interpretation: ISO-8859-1 maps bytes straight to
            // the first Unicode block.
            None => text.extend(bytes.iter().map(|&b| b as char)),
        },
    }
    byte_segments.push(bytes);
    Ok(())
}

/// UTF-8 sniffing for unmarked byte segments: a BOM or a valid non-ASCII
/// UTF-8 sequence selects UTF-8 over the ISO-8859-1 default.
fn guess_utf8(bytes: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(bytes).ok()?;
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some(&text[3..]);
    }
    bytes.iter().any(|&b| b >= 0x80).then_some(text)
}

fn decode_kanji_segment(
    bits: &mut BitSource<'_>,
    text: &mut String,
    count: usize,
) -> Result<(), DecodeError> {
    if bits.available() < 13 * count {
        return Err(DecodeError::TruncatedStream);
    }
    let mut bytes = Vec::with_capacity(2 * count);
    for _ in 0..count {
        let value = bits.read_bits(13)?;
        let assembled = ((value / 0x0C0) << 8) | (value % 0x0C0);
        let shift_jis = if assembled < 0x01F00 {
            // 0x8140..=0x9FFC
            assembled + 0x08140
        } else {
            // 0xE040..=0xEBBF
            assembled + 0x0C140
        };
        bytes.push((shift_jis >> 8) as u8);
        bytes.push(shift_jis as u8);
    }
    let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes);
    if had_errors {
        return Err(DecodeError::MalformedSegment);
    }
    text.push_str(&decoded);
    Ok(())
}

fn decode_hanzi_segment(
    bits: &mut BitSource<'_>,
    text: &mut String,
    count: usize,
) -> Result<(), DecodeError> {
    if bits.available() < 13 * count {
        return Err(DecodeError::TruncatedStream);
    }
    let mut bytes = Vec::with_capacity(2 * count);
    for _ in 0..count {
        let value = bits.read_bits(13)?;
        let assembled = ((value / 0x060) << 8) | (value % 0x060);
        let gb = if assembled < 0x00A00 {
            // 0xA1A1..=0xAAFE
            assembled + 0x0A1A1
        } else {
            // 0xB0A1..=0xFAFE
            assembled + 0x0A6A1
        };
        bytes.push((gb >> 8) as u8);
        bytes.push(gb as u8);
    }
    let (decoded, _, had_errors) = encoding_rs::GB18030.decode(&bytes);
    if had_errors {
        return Err(DecodeError::MalformedSegment);
    }
    text.push_str(&decoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::BitBuffer;

    fn v1() -> Version {
        Version::new(1).unwrap()
    }

    fn parse(buffer: BitBuffer) -> Result<DecoderResult, DecodeError> {
        parse_bit_stream(&buffer.into_bytes(), v1(), None)
    }

    #[test]
    fn numeric_groups_of_three_two_and_one() {
        let mut b = BitBuffer::new();
        b.push(Mode::Numeric.bits(), 4);
        b.push(6, 10); // "123456"
        b.push(123, 10);
        b.push(456, 10);
        let result = parse(b).unwrap();
        assert_eq!(result.text, "123456");

        let mut b = BitBuffer::new();
        b.push(Mode::Numeric.bits(), 4);
        b.push(4, 10); // "9876"
        b.push(987, 10);
        b.push(6, 4);
        assert_eq!(parse(b).unwrap().text, "9876");

        let mut b = BitBuffer::new();
        b.push(Mode::Numeric.bits(), 4);
        b.push(5, 10); // "98765"
        b.push(987, 10);
        b.push(65, 7);
        assert_eq!(parse(b).unwrap().text, "98765");
    }

    #[test]
    fn numeric_rejects_out_of_range_groups() {
        let mut b = BitBuffer::new();
        b.push(Mode::Numeric.bits(), 4);
        b.push(3, 10);
        b.push(1001, 10);
        assert_eq!(parse(b).unwrap_err(), DecodeError::MalformedSegment);
    }

    #[test]
    fn alphanumeric_pairs_and_tail() {
        // "AC-42": pairs (A,C), (-,4), tail 2.
        let mut b = BitBuffer::new();
        b.push(Mode::Alphanumeric.bits(), 4);
        b.push(5, 9);
        b.push(10 * 45 + 12, 11);
        b.push(41 * 45 + 4, 11);
        b.push(2, 6);
        assert_eq!(parse(b).unwrap().text, "AC-42");
    }

    #[test]
    fn fnc1_percent_escapes() {
        // FNC1 then "A%%B%C" -> "A%B<GS>C".
        let mut b = BitBuffer::new();
        b.push(Mode::Fnc1First.bits(), 4);
        b.push(Mode::Alphanumeric.bits(), 4);
        b.push(6, 9);
        let chars = [10u32, 38, 38, 11, 38, 12]; // A % % B % C
        for pair in chars.chunks(2) {
            b.push(pair[0] * 45 + pair[1], 11);
        }
        let result = parse(b).unwrap();
        assert_eq!(result.text, format!("A%B{GS}C"));
    }

    #[test]
    fn byte_segment_latin1_default() {
        let mut b = BitBuffer::new();
        b.push(Mode::Byte.bits(), 4);
        b.push(3, 8);
        for byte in [0x41u32, 0xE9, 0x21] {
            b.push(byte, 8);
        }
        let result = parse(b).unwrap();
        // 0xE9 is not valid UTF-8 here, so Latin-1 applies.
        assert_eq!(result.text, "Aé!");
        assert_eq!(result.byte_segments, vec![vec![0x41, 0xE9, 0x21]]);
    }

    #[test]
    fn byte_segment_utf8_heuristic() {
        let snowman = "hi ☃".as_bytes();
        let mut b = BitBuffer::new();
        b.push(Mode::Byte.bits(), 4);
        b.push(snowman.len() as u32, 8);
        for &byte in snowman {
            b.push(byte as u32, 8);
        }
        assert_eq!(parse(b).unwrap().text, "hi ☃");
    }

    #[test]
    fn eci_switches_byte_charset() {
        // ECI 7 selects ISO-8859-5; 0xCF is Cyrillic "Я".
        let mut b = BitBuffer::new();
        b.push(Mode::Eci.bits(), 4);
        b.push(7, 8);
        b.push(Mode::Byte.bits(), 4);
        b.push(1, 8);
        b.push(0xCF, 8);
        assert_eq!(parse(b).unwrap().text, "Я");
    }

    #[test]
    fn unsupported_eci_is_rejected() {
        let mut b = BitBuffer::new();
        b.push(Mode::Eci.bits(), 4);
        b.push(99, 8);
        assert_eq!(parse(b).unwrap_err(), DecodeError::UnsupportedEci { value: 99 });
    }

    #[test]
    fn kanji_two_byte_round_trip() {
        // 0x935F is Shift-JIS for 点: (0x935F - 0x8140) -> 0x121F ->
        // 13-bit value 0x12 * 0xC0 + 0x1F.
        let mut b = BitBuffer::new();
        b.push(Mode::Kanji.bits(), 4);
        b.push(1, 8);
        b.push(0x12 * 0xC0 + 0x1F, 13);
        assert_eq!(parse(b).unwrap().text, "点");
    }

    #[test]
    fn hanzi_two_byte_round_trip() {
        // 0xB0A1 is GB2312 for 啊: assembled 0x0A00 -> subtracting the
        // second-range offset gives value 0x0A * 0x60 + 0x00.
        let mut b = BitBuffer::new();
        b.push(Mode::Hanzi.bits(), 4);
        b.push(GB2312_SUBSET, 4);
        b.push(1, 8);
        b.push(0x0A * 0x60, 13);
        assert_eq!(parse(b).unwrap().text, "啊");
    }

    #[test]
    fn structured_append_is_metadata() {
        let mut b = BitBuffer::new();
        b.push(Mode::StructuredAppend.bits(), 4);
        b.push(0x23, 8);
        b.push(0x77, 8);
        b.push(Mode::Numeric.bits(), 4);
        b.push(1, 10);
        b.push(7, 4);
        let result = parse(b).unwrap();
        assert_eq!(result.text, "7");
        assert_eq!(
            result.structured_append,
            Some(StructuredAppend { sequence: 0x23, parity: 0x77 })
        );
    }

    #[test]
    fn terminator_stops_parsing() {
        let mut b = BitBuffer::new();
        b.push(Mode::Numeric.bits(), 4);
        b.push(1, 10);
        b.push(3, 4);
        b.push(Mode::Terminator.bits(), 4);
        // Trailing garbage after the terminator is ignored.
        b.push(0x3FF, 10);
        assert_eq!(parse(b).unwrap().text, "3");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let mut b = BitBuffer::new();
        b.push(0x6, 4);
        b.push(0, 8);
        assert_eq!(parse(b).unwrap_err(), DecodeError::InvalidMode { bits: 0x6 });
    }
}
