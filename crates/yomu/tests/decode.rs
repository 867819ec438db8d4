//! End-to-end pipeline tests on synthetic frames.

use std::sync::Arc;

use yomu::decoding::testutil::{build_symbol, finalize_codewords, BitBuffer};
use yomu::decoding::{Mode, Version};
use yomu::{
    BitMatrix, DecoderResult, Error, ErrorCorrectionLevel, ErrorKind, LinearScanner, Luminance,
    SourceImage, Yomu,
};

/// Render a symbol into a grayscale canvas with a quiet zone.
fn rasterize(symbol: &BitMatrix, scale: usize, quiet: usize) -> (Vec<u8>, usize) {
    let dim = symbol.width();
    let size = (dim + 2 * quiet) * scale;
    let mut pixels = vec![255u8; size * size];
    blit(symbol, scale, quiet * scale, quiet * scale, &mut pixels, size);
    (pixels, size)
}

fn blit(
    symbol: &BitMatrix,
    scale: usize,
    left: usize,
    top: usize,
    canvas: &mut [u8],
    canvas_width: usize,
) {
    for y in 0..symbol.height() {
        for x in 0..symbol.width() {
            if !symbol.get(x, y) {
                continue;
            }
            for py in 0..scale {
                for px in 0..scale {
                    let cx = left + x * scale + px;
                    let cy = top + y * scale + py;
                    canvas[cy * canvas_width + cx] = 0;
                }
            }
        }
    }
}

fn numeric_symbol(version: u8, level: ErrorCorrectionLevel, mask: u8, digits: &str) -> BitMatrix {
    let version = Version::new(version).unwrap();
    let mut buffer = BitBuffer::new();
    buffer.push(Mode::Numeric.bits(), 4);
    buffer.push(
        digits.len() as u32,
        Mode::Numeric.character_count_bits(version),
    );
    for chunk in digits.as_bytes().chunks(3) {
        let value: u32 = std::str::from_utf8(chunk).unwrap().parse().unwrap();
        match chunk.len() {
            3 => buffer.push(value, 10),
            2 => buffer.push(value, 7),
            _ => buffer.push(value, 4),
        }
    }
    let codewords = finalize_codewords(buffer, version, level);
    build_symbol(version, level, mask, &codewords)
}

#[test]
fn decodes_numeric_version1_frame() {
    let symbol = numeric_symbol(1, ErrorCorrectionLevel::L, 4, "1234");
    let (pixels, size) = rasterize(&symbol, 8, 4);
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();

    let result = Yomu::qr_only().decode(&frame).expect("decode");
    assert_eq!(result.text, "1234");
    assert_eq!(result.ec_level, Some(ErrorCorrectionLevel::L));
}

#[test]
fn decoding_is_idempotent() {
    let symbol = numeric_symbol(1, ErrorCorrectionLevel::M, 2, "8675309");
    let (pixels, size) = rasterize(&symbol, 6, 4);
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();

    let reader = Yomu::qr_only();
    let first = reader.decode(&frame).expect("first decode");
    let second = reader.decode(&frame).expect("second decode");
    assert_eq!(first, second);
}

#[test]
fn decodes_version2_frame_with_alignment_pattern() {
    let symbol = numeric_symbol(2, ErrorCorrectionLevel::Q, 6, "31415926535897932384");
    let (pixels, size) = rasterize(&symbol, 7, 4);
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();

    let result = Yomu::qr_only().decode(&frame).expect("decode");
    assert_eq!(result.text, "31415926535897932384");
    assert_eq!(result.ec_level, Some(ErrorCorrectionLevel::Q));
}

#[test]
fn decodes_rgba_input() {
    let symbol = numeric_symbol(1, ErrorCorrectionLevel::L, 0, "42");
    let (gray, size) = rasterize(&symbol, 8, 4);
    let mut rgba = Vec::with_capacity(gray.len() * 4);
    for &v in &gray {
        rgba.extend_from_slice(&[v, v, v, 0xFF]);
    }
    let frame = SourceImage::rgba(&rgba, size, size).unwrap();
    assert_eq!(Yomu::qr_only().decode(&frame).unwrap().text, "42");
}

#[test]
fn decode_all_reads_both_symbols() {
    // Two symbols at distinct module sizes so their finder patterns can
    // never be confused into one triple.
    let a = numeric_symbol(1, ErrorCorrectionLevel::L, 1, "1111");
    let b = numeric_symbol(1, ErrorCorrectionLevel::L, 3, "2222");

    let width = 480;
    let height = 260;
    let mut canvas = vec![255u8; width * height];
    blit(&a, 8, 24, 24, &mut canvas, width); // 8 px modules
    blit(&b, 5, 300, 60, &mut canvas, width); // 5 px modules

    let frame = SourceImage::grayscale(&canvas, width, height).unwrap();
    let mut texts: Vec<String> = Yomu::qr_only()
        .decode_all(&frame)
        .expect("decode_all")
        .into_iter()
        .map(|r| r.text)
        .collect();
    texts.sort();
    assert_eq!(texts, vec!["1111".to_string(), "2222".to_string()]);
}

#[test]
fn decode_all_is_empty_when_qr_disabled() {
    let symbol = numeric_symbol(1, ErrorCorrectionLevel::L, 0, "7");
    let (pixels, size) = rasterize(&symbol, 8, 4);
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();
    let results = Yomu::barcode_only().decode_all(&frame).expect("decode_all");
    assert!(results.is_empty());
}

#[test]
fn noise_frame_fails_with_detection_error() {
    let size = 256usize;
    let mut pixels = vec![0u8; size * size];
    let mut state = 0x9E3779B9u32;
    for p in pixels.iter_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *p = (state >> 24) as u8;
    }
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();
    let err = Yomu::qr_only().decode(&frame).expect_err("must not decode");
    assert_eq!(err.kind(), ErrorKind::Detection);
}

struct FixedScanner;

impl LinearScanner for FixedScanner {
    fn scan(&self, _luma: &Luminance<'_>) -> Option<DecoderResult> {
        Some(DecoderResult {
            text: "0123456789012".to_owned(),
            byte_segments: Vec::new(),
            ec_level: None,
            structured_append: None,
        })
    }
}

#[test]
fn linear_fallback_runs_when_no_qr_found() {
    let pixels = vec![255u8; 64 * 64];
    let frame = SourceImage::grayscale(&pixels, 64, 64).unwrap();

    let reader = Yomu::all().with_linear_scanner(Arc::new(FixedScanner));
    let result = reader.decode(&frame).expect("linear fallback");
    assert_eq!(result.text, "0123456789012");
    assert_eq!(result.ec_level, None);
}

#[test]
fn nothing_found_reports_the_combined_error() {
    let pixels = vec![255u8; 64 * 64];
    let frame = SourceImage::grayscale(&pixels, 64, 64).unwrap();
    let err = Yomu::all().decode(&frame).expect_err("blank frame");
    assert_eq!(err.kind(), ErrorKind::Detection);
    assert_eq!(err.to_string(), "no QR code or barcode found");
}

#[test]
fn unreadable_symbol_errors_surface_unrecovered() {
    // Wreck a symbol's data region beyond parity capacity while keeping
    // its finder patterns intact: detection succeeds, correction cannot.
    let mut symbol = numeric_symbol(1, ErrorCorrectionLevel::L, 0, "1234");
    for y in 9..12 {
        for x in 0..21 {
            if symbol.get(x, y) {
                symbol.flip(x, y);
            } else {
                symbol.set(x, y);
            }
        }
    }
    let (pixels, size) = rasterize(&symbol, 8, 4);
    let frame = SourceImage::grayscale(&pixels, size, size).unwrap();
    match Yomu::qr_only().decode(&frame) {
        Err(err) => assert!(
            matches!(err.kind(), ErrorKind::ReedSolomon | ErrorKind::Decode),
            "unexpected kind {:?}",
            err.kind()
        ),
        Ok(result) => assert_ne!(result.text, "1234"),
    }
}
