//! Sampling the rectified module grid out of the binarized image.

use yomu_core::BitMatrix;

use crate::perspective::PerspectiveTransform;

/// Probe the source image at every module center of a `dimension`-wide grid
/// mapped through `transform`, producing the symbol's bit matrix.
///
/// Sample points are taken at `(x + 0.5, y + 0.5)` in module space, mapped
/// in place one row at a time, and truncated to integer pixels. Points
/// falling outside the source contribute white. Both the probe and the
/// write go through the raw word layout; this loop dominates the sampling
/// stage's budget.
pub fn sample_grid(
    image: &BitMatrix,
    transform: &PerspectiveTransform,
    dimension: usize,
) -> BitMatrix {
    let mut bits = BitMatrix::new(dimension, dimension);
    let src_words = image.raw_words();
    let src_stride = image.row_stride();
    let width = image.width() as i64;
    let height = image.height() as i64;

    let mut points = vec![0.0f64; 2 * dimension];
    for y in 0..dimension {
        let row_center = y as f64 + 0.5;
        for x in 0..dimension {
            points[2 * x] = x as f64 + 0.5;
            points[2 * x + 1] = row_center;
        }
        transform.transform_points(&mut points);

        let dst_base = y * bits.row_stride();
        let dst_words = bits.raw_words_mut();
        for x in 0..dimension {
            let sx = points[2 * x] as i64;
            let sy = points[2 * x + 1] as i64;
            if sx < 0 || sx >= width || sy < 0 || sy >= height {
                continue;
            }
            let word = src_words[sy as usize * src_stride + (sx as usize >> 5)];
            if (word >> (sx as usize & 31)) & 1 != 0 {
                dst_words[dst_base + (x >> 5)] |= 1 << (x & 31);
            }
        }
    }
    bits
}
