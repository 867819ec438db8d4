//! Global histogram black-point estimation, the cheap alternative to the
//! adaptive thresholder for evenly lit frames.

use crate::bitmatrix::BitMatrix;
use crate::luminance::Luminance;

/// Number of histogram buckets; luminance is quantized by this shift.
pub const BUCKET_COUNT: usize = 32;
const LUMINANCE_SHIFT: u32 = 3;

/// Estimate the global dark/light split from a 32-bucket luminance
/// histogram.
///
/// Picks the tallest peak, then the second peak maximizing
/// `count * distance^2` from it, and returns the valley between them with
/// the lowest `count * distance_to_first^2` score, rescaled to 0..255.
/// Returns `None` when the histogram has no two separated peaks.
pub fn estimate_black_point(buckets: &[u32; BUCKET_COUNT]) -> Option<u8> {
    let mut first_peak = 0usize;
    let mut first_count = 0u32;
    for (i, &c) in buckets.iter().enumerate() {
        if c > first_count {
            first_count = c;
            first_peak = i;
        }
    }

    let mut second_peak = first_peak;
    let mut second_score = 0u64;
    for (i, &c) in buckets.iter().enumerate() {
        let dist = i.abs_diff(first_peak) as u64;
        let score = c as u64 * dist * dist;
        if score > second_score {
            second_score = score;
            second_peak = i;
        }
    }

    let (lo, hi) = if first_peak <= second_peak {
        (first_peak, second_peak)
    } else {
        (second_peak, first_peak)
    };
    if hi - lo <= BUCKET_COUNT / 16 {
        return None;
    }

    let mut valley = hi - 1;
    let mut valley_score = u64::MAX;
    for x in lo + 1..hi {
        let dist = (x - lo) as u64;
        let score = buckets[x] as u64 * dist * dist;
        if score < valley_score {
            valley_score = score;
            valley = x;
        }
    }

    Some((valley << LUMINANCE_SHIFT) as u8)
}

/// Histogram a luminance buffer into [`BUCKET_COUNT`] buckets.
pub fn bucketize(luma: &Luminance<'_>) -> [u32; BUCKET_COUNT] {
    let mut buckets = [0u32; BUCKET_COUNT];
    for &p in luma.as_slice() {
        buckets[(p >> LUMINANCE_SHIFT) as usize] += 1;
    }
    buckets
}

/// Binarize with a single global threshold estimated from the histogram.
///
/// Returns `None` when no black point can be estimated.
pub fn binarize_global(luma: &Luminance<'_>) -> Option<BitMatrix> {
    let Some(threshold) = estimate_black_point(&bucketize(luma)) else {
        log::warn!("luminance histogram has no separable peaks");
        return None;
    };
    Some(BitMatrix::from_luminance(
        luma.as_slice(),
        luma.width(),
        luma.height(),
        threshold,
    ))
}
