//! Alignment pattern search: the small concentric mark that pins down
//! perspective for version 2+ symbols.

use nalgebra::Point2;
use yomu_core::BitMatrix;

/// One candidate alignment pattern center.
#[derive(Clone, Copy, Debug)]
pub struct AlignmentPattern {
    pub position: Point2<f64>,
    pub module_size: f64,
}

impl AlignmentPattern {
    fn about_equals(&self, module_size: f64, x: f64, y: f64) -> bool {
        if (y - self.position.y).abs() <= module_size
            && (x - self.position.x).abs() <= module_size
        {
            let delta = (module_size - self.module_size).abs();
            return delta <= 1.0 || delta <= self.module_size;
        }
        false
    }

    fn combine_estimate(&self, x: f64, y: f64, new_module_size: f64) -> Self {
        Self {
            position: Point2::new((self.position.x + x) / 2.0, (self.position.y + y) / 2.0),
            module_size: (self.module_size + new_module_size) / 2.0,
        }
    }
}

/// Scanner for one rectangular search region.
///
/// Hunts a white/black/white 1:1:1 run triple centered on the pattern's
/// core module, walking rows middle-out, and returns as soon as a second
/// sighting confirms a center.
pub struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f64,
    possible_centers: Vec<AlignmentPattern>,
}

impl<'a> AlignmentPatternFinder<'a> {
    pub fn new(
        image: &'a BitMatrix,
        start_x: usize,
        start_y: usize,
        width: usize,
        height: usize,
        module_size: f64,
    ) -> Self {
        Self {
            image,
            start_x,
            start_y,
            width,
            height,
            module_size,
            possible_centers: Vec::new(),
        }
    }

    /// Scan the region; `None` when nothing plausible is found (callers
    /// fall back to the parallelogram corner estimate).
    pub fn find(mut self) -> Option<AlignmentPattern> {
        let max_x = (self.start_x + self.width).min(self.image.width());
        let middle_y = self.start_y + self.height / 2;

        for y_gen in 0..self.height {
            // Middle-out row order: middle, one up, one down, two up...
            let offset = y_gen.div_ceil(2);
            let y = if y_gen & 1 == 0 {
                middle_y + offset
            } else {
                match middle_y.checked_sub(offset) {
                    Some(v) => v,
                    None => continue,
                }
            };
            if y >= self.image.height() {
                continue;
            }

            if let Some(confirmed) = self.scan_row(y, max_x) {
                return Some(confirmed);
            }
        }

        // Nothing was sighted twice; a single sighting still beats the
        // parallelogram fallback.
        self.possible_centers.first().copied()
    }

    fn scan_row(&mut self, y: usize, max_x: usize) -> Option<AlignmentPattern> {
        let mut x = self.start_x;
        // Burn off the leading light run: it may cross the region edge, so
        // its length is unknown and must not seed the state machine. The
        // first dark run then enters with a zero light slot and can never
        // pass the ratio test either; tracking recovers from there.
        while x < max_x && !self.image.get(x, y) {
            x += 1;
        }

        let mut state_count = [0usize; 3];
        let mut current_state = 0usize;
        while x < max_x {
            if self.image.get(x, y) {
                if current_state == 1 {
                    state_count[1] += 1;
                } else if current_state == 2 {
                    // Dark again after a full light/dark/light triple.
                    if self.found_pattern_cross(&state_count) {
                        if let Some(confirmed) = self.handle_possible_center(&state_count, y, x)
                        {
                            return Some(confirmed);
                        }
                    }
                    state_count[0] = state_count[2];
                    state_count[1] = 1;
                    state_count[2] = 0;
                    current_state = 1;
                } else {
                    current_state += 1;
                    state_count[current_state] += 1;
                }
            } else {
                if current_state == 1 {
                    current_state = 2;
                }
                state_count[current_state] += 1;
            }
            x += 1;
        }

        if self.found_pattern_cross(&state_count) {
            if let Some(confirmed) = self.handle_possible_center(&state_count, y, max_x) {
                return Some(confirmed);
            }
        }
        None
    }

    /// 1:1:1 proportion test against the expected module size.
    fn found_pattern_cross(&self, state_count: &[usize; 3]) -> bool {
        let max_variance = self.module_size / 2.0;
        for &count in state_count {
            if count == 0 || (self.module_size - count as f64).abs() >= max_variance {
                return false;
            }
        }
        true
    }

    fn center_from_end(state_count: &[usize; 3], end: usize) -> f64 {
        end as f64 - state_count[2] as f64 - state_count[1] as f64 / 2.0
    }

    fn cross_check_vertical(
        &self,
        start_y: usize,
        center_x: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f64> {
        let image = self.image;
        let max_y = image.height();
        let mut state_count = [0usize; 3];

        let mut y = start_y as isize;
        while y >= 0 && image.get(center_x, y as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            y -= 1;
        }
        if y < 0 || state_count[1] > max_count {
            return None;
        }
        while y >= 0 && !image.get(center_x, y as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            y -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut y = start_y + 1;
        while y < max_y && image.get(center_x, y) && state_count[1] <= max_count {
            state_count[1] += 1;
            y += 1;
        }
        if y == max_y || state_count[1] > max_count {
            return None;
        }
        while y < max_y && !image.get(center_x, y) && state_count[2] <= max_count {
            state_count[2] += 1;
            y += 1;
        }
        if state_count[2] > max_count {
            return None;
        }

        let total: usize = state_count.iter().sum();
        if 5 * total.abs_diff(original_total) >= 2 * original_total {
            return None;
        }

        self.found_pattern_cross(&state_count)
            .then(|| Self::center_from_end(&state_count, y))
    }

    /// Cross-check a horizontal candidate; a previous sighting in agreement
    /// confirms the pattern.
    fn handle_possible_center(
        &mut self,
        state_count: &[usize; 3],
        y: usize,
        end_x: usize,
    ) -> Option<AlignmentPattern> {
        let total: usize = state_count.iter().sum();
        let center_x = Self::center_from_end(state_count, end_x);
        let center_y =
            self.cross_check_vertical(y, center_x.trunc() as usize, 2 * state_count[1], total)?;

        let estimated_module_size = total as f64 / 3.0;
        for center in &self.possible_centers {
            if center.about_equals(estimated_module_size, center_x, center_y) {
                return Some(center.combine_estimate(center_x, center_y, estimated_module_size));
            }
        }
        self.possible_centers.push(AlignmentPattern {
            position: Point2::new(center_x, center_y),
            module_size: estimated_module_size,
        });
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Paint a 5×5 alignment pattern centered at module `(cx, cy)`.
    pub(crate) fn draw_alignment_pattern(m: &mut BitMatrix, cx: usize, cy: usize, scale: usize) {
        for my in 0..5 {
            for mx in 0..5 {
                let ring = mx == 0 || mx == 4 || my == 0 || my == 4;
                let core = mx == 2 && my == 2;
                if ring || core {
                    let left = (cx - 2 + mx) * scale;
                    let top = (cy - 2 + my) * scale;
                    for py in 0..scale {
                        for px in 0..scale {
                            m.set(left + px, top + py);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn finds_centered_pattern() {
        let scale = 4;
        let mut m = BitMatrix::new(30 * scale, 30 * scale);
        draw_alignment_pattern(&mut m, 15, 15, scale);

        let finder = AlignmentPatternFinder::new(
            &m,
            10 * scale,
            10 * scale,
            10 * scale,
            10 * scale,
            scale as f64,
        );
        let pattern = finder.find().expect("alignment pattern");
        let expected = 15.5 * scale as f64;
        assert!((pattern.position.x - expected).abs() < 1.0, "{pattern:?}");
        assert!((pattern.position.y - expected).abs() < 1.0, "{pattern:?}");
        assert!((pattern.module_size - scale as f64).abs() < 1.0);
    }

    #[test]
    fn empty_region_yields_none() {
        let m = BitMatrix::new(100, 100);
        let finder = AlignmentPatternFinder::new(&m, 20, 20, 40, 40, 3.0);
        assert!(finder.find().is_none());
    }

    #[test]
    fn wrong_scale_pattern_is_rejected() {
        // A pattern four times larger than expected must not match.
        let mut m = BitMatrix::new(200, 200);
        draw_alignment_pattern(&mut m, 6, 6, 16);
        let finder = AlignmentPatternFinder::new(&m, 40, 40, 80, 80, 4.0);
        assert!(finder.find().is_none());
    }
}
