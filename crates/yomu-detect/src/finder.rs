//! Finder pattern search: locating the three 1:1:3:1:1 position marks.

use nalgebra::Point2;
use yomu_core::BitMatrix;

use crate::error::DetectionError;

/// Two centers merged into one candidate need at least this many sightings
/// before they count as confirmed.
const CENTER_QUORUM: u32 = 2;
const MIN_ROW_SKIP: usize = 3;
/// A symbol is at most 57 modules wide at the search stage (version 10);
/// denser symbols are still caught by the skip-reset once a center is seen.
const MAX_MODULES: usize = 57;

const MAX_SIZE_RATIO: f64 = 1.5;
const MAX_LEG_RATIO: f64 = 1.35;
const HYPOTENUSE_TOLERANCE: f64 = 0.35;

/// One candidate position mark with its accumulated center estimate.
#[derive(Clone, Copy, Debug)]
pub struct FinderPattern {
    pub position: Point2<f64>,
    pub module_size: f64,
    count: u32,
}

impl FinderPattern {
    fn new(x: f64, y: f64, module_size: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            module_size,
            count: 1,
        }
    }

    /// Number of scan sightings merged into this candidate.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True when `(x, y)` lies within one module of this center and the
    /// module-size estimates are compatible.
    fn about_equals(&self, module_size: f64, x: f64, y: f64) -> bool {
        if (y - self.position.y).abs() <= module_size
            && (x - self.position.x).abs() <= module_size
        {
            let delta = (module_size - self.module_size).abs();
            return delta <= 1.0 || delta <= self.module_size;
        }
        false
    }

    /// Weighted average of this candidate with one more sighting.
    fn combine_estimate(&self, x: f64, y: f64, new_module_size: f64) -> Self {
        let combined = self.count + 1;
        let c = self.count as f64;
        let cc = combined as f64;
        Self {
            position: Point2::new(
                (c * self.position.x + x) / cc,
                (c * self.position.y + y) / cc,
            ),
            module_size: (c * self.module_size + new_module_size) / cc,
            count: combined,
        }
    }
}

/// The ordered corner triple of one symbol.
#[derive(Clone, Copy, Debug)]
pub struct FinderPatternGroup {
    pub top_left: FinderPattern,
    pub top_right: FinderPattern,
    pub bottom_left: FinderPattern,
}

impl FinderPatternGroup {
    /// Assign roles to an unordered triple: the two patterns spanning the
    /// longest edge are top-right and bottom-left, the remaining one is the
    /// right-angle vertex (top-left). The cross product of the two edges
    /// picks the right-handed assignment.
    pub fn from_unordered(patterns: [FinderPattern; 3]) -> Self {
        let [p0, p1, p2] = patterns;
        let d01 = distance(&p0, &p1);
        let d02 = distance(&p0, &p2);
        let d12 = distance(&p1, &p2);

        let (top_left, a, b) = if d12 >= d01 && d12 >= d02 {
            (p0, p1, p2)
        } else if d02 >= d01 && d02 >= d12 {
            (p1, p0, p2)
        } else {
            (p2, p0, p1)
        };

        let cross = cross_product_z(&top_left, &a, &b);
        let (top_right, bottom_left) = if cross > 0.0 { (a, b) } else { (b, a) };

        Self {
            top_left,
            top_right,
            bottom_left,
        }
    }
}

fn distance(a: &FinderPattern, b: &FinderPattern) -> f64 {
    (a.position - b.position).norm()
}

/// z component of `(a - origin) × (b - origin)`.
fn cross_product_z(origin: &FinderPattern, a: &FinderPattern, b: &FinderPattern) -> f64 {
    let va = a.position - origin.position;
    let vb = b.position - origin.position;
    va.x * vb.y - va.y * vb.x
}

/// Row-scanning search for finder patterns over a binarized image.
pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
    has_skipped: bool,
}

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self {
            image,
            possible_centers: Vec::new(),
            has_skipped: false,
        }
    }

    /// Locate the best corner triple in the image.
    pub fn find(image: &'a BitMatrix) -> Result<FinderPatternGroup, DetectionError> {
        let mut finder = Self::new(image);
        finder.scan(true);
        let triple = finder.select_best_triplet()?;
        Ok(FinderPatternGroup::from_unordered(triple))
    }

    /// Locate every non-overlapping corner triple, best-scoring first.
    pub fn find_multi(image: &'a BitMatrix) -> Vec<FinderPatternGroup> {
        let mut finder = Self::new(image);
        finder.scan(false);
        finder.select_all_triplets()
    }

    /// Candidates accumulated so far (after [`scan`](Self::scan)).
    pub fn possible_centers(&self) -> &[FinderPattern] {
        &self.possible_centers
    }

    /// Sweep rows accumulating candidate centers. Rows are skipped
    /// proportionally to the expected module size; once a center is
    /// confirmed the skip tightens to 2, and with two confirmed centers the
    /// scan can leap ahead to where the bottom-left pattern must start.
    pub fn scan(&mut self, stop_early: bool) {
        let max_x = self.image.width();
        let max_y = self.image.height();
        let mut skip = (3 * max_y / (4 * MAX_MODULES)).max(MIN_ROW_SKIP);

        let mut done = false;
        let mut y = skip - 1;
        while y < max_y && !done {
            let mut state_count = [0usize; 5];
            let mut current_state = 0usize;
            let mut x = 0usize;
            while x < max_x {
                if self.image.get(x, y) {
                    // Dark pixel.
                    if current_state & 1 == 1 {
                        current_state += 1;
                    }
                    state_count[current_state] += 1;
                } else if current_state & 1 == 0 {
                    // Light pixel while counting dark.
                    if current_state == 4 {
                        if Self::found_pattern_cross(&state_count)
                            && self.handle_possible_center(&state_count, y, x)
                        {
                            skip = 2;
                            if self.has_skipped {
                                done = stop_early && self.have_multiply_confirmed_centers();
                            } else {
                                let row_skip = self.find_row_skip();
                                if row_skip > state_count[2] {
                                    // Leap to just above where the
                                    // bottom-left pattern can begin.
                                    y += row_skip.saturating_sub(state_count[2] + skip);
                                    break;
                                }
                            }
                            state_count = [0; 5];
                            current_state = 0;
                        } else {
                            shift_counts_back(&mut state_count);
                            current_state = 3;
                        }
                    } else {
                        current_state += 1;
                        state_count[current_state] += 1;
                    }
                } else {
                    state_count[current_state] += 1;
                }
                x += 1;
            }
            if Self::found_pattern_cross(&state_count)
                && self.handle_possible_center(&state_count, y, max_x)
            {
                skip = state_count[0].max(1);
                if self.has_skipped {
                    done = stop_early && self.have_multiply_confirmed_centers();
                }
            }
            y += skip;
        }
    }

    /// Pick the triplet with the most consistent module sizes among all
    /// geometrically valid combinations.
    fn select_best_triplet(&self) -> Result<[FinderPattern; 3], DetectionError> {
        let centers = &self.possible_centers;
        if centers.len() < 3 {
            return Err(DetectionError::TooFewFinderPatterns {
                found: centers.len(),
            });
        }

        let mut best: Option<([FinderPattern; 3], f64)> = None;
        for i in 0..centers.len() {
            for j in i + 1..centers.len() {
                for k in j + 1..centers.len() {
                    let triple = [centers[i], centers[j], centers[k]];
                    if !is_valid_triplet(&triple) {
                        continue;
                    }
                    let score = size_consistency_score(&triple);
                    if best.as_ref().is_none_or(|(_, s)| score < *s) {
                        best = Some((triple, score));
                    }
                }
            }
        }

        best.map(|(t, _)| t).ok_or(DetectionError::NoValidTriplet)
    }

    /// All valid triplets, each finder pattern claimed by at most one group
    /// (best size consistency wins).
    fn select_all_triplets(&self) -> Vec<FinderPatternGroup> {
        let centers = &self.possible_centers;
        let mut scored: Vec<([usize; 3], f64)> = Vec::new();
        for i in 0..centers.len() {
            for j in i + 1..centers.len() {
                for k in j + 1..centers.len() {
                    let triple = [centers[i], centers[j], centers[k]];
                    if is_valid_triplet(&triple) {
                        scored.push(([i, j, k], size_consistency_score(&triple)));
                    }
                }
            }
        }
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut used = vec![false; centers.len()];
        let mut groups = Vec::new();
        for (idx, _) in scored {
            if idx.iter().any(|&i| used[i]) {
                continue;
            }
            for &i in &idx {
                used[i] = true;
            }
            groups.push(FinderPatternGroup::from_unordered([
                centers[idx[0]],
                centers[idx[1]],
                centers[idx[2]],
            ]));
        }
        groups
    }

    /// Check the 1:1:3:1:1 proportions of five run lengths, allowing half a
    /// module of variance per unit.
    fn found_pattern_cross(state_count: &[usize; 5]) -> bool {
        let mut total = 0usize;
        for &c in state_count {
            if c == 0 {
                return false;
            }
            total += c;
        }
        if total < 7 {
            return false;
        }
        let module_size = total as f64 / 7.0;
        let max_variance = module_size / 2.0;
        (module_size - state_count[0] as f64).abs() < max_variance
            && (module_size - state_count[1] as f64).abs() < max_variance
            && (3.0 * module_size - state_count[2] as f64).abs() < 3.0 * max_variance
            && (module_size - state_count[3] as f64).abs() < max_variance
            && (module_size - state_count[4] as f64).abs() < max_variance
    }

    /// Tighter variant used by the diagonal cross-check.
    fn found_pattern_diagonal(state_count: &[usize; 5]) -> bool {
        let mut total = 0usize;
        for &c in state_count {
            if c == 0 {
                return false;
            }
            total += c;
        }
        if total < 7 {
            return false;
        }
        let module_size = total as f64 / 7.0;
        let max_variance = module_size / 1.333;
        (module_size - state_count[0] as f64).abs() < max_variance
            && (module_size - state_count[1] as f64).abs() < max_variance
            && (3.0 * module_size - state_count[2] as f64).abs() < 3.0 * max_variance
            && (module_size - state_count[3] as f64).abs() < max_variance
            && (module_size - state_count[4] as f64).abs() < max_variance
    }

    /// Sub-pixel center of the middle run given the scan end position.
    fn center_from_end(state_count: &[usize; 5], end: usize) -> f64 {
        end as f64 - state_count[4] as f64 - state_count[3] as f64 - state_count[2] as f64 / 2.0
    }

    /// Re-walk the candidate column vertically and confirm the 1:1:3:1:1
    /// profile; returns the sub-pixel row center.
    fn cross_check_vertical(
        &self,
        start_y: usize,
        center_x: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f64> {
        let image = self.image;
        let max_y = image.height();
        let mut state_count = [0usize; 5];

        let mut y = start_y as isize;
        while y >= 0 && image.get(center_x, y as usize) {
            state_count[2] += 1;
            y -= 1;
        }
        if y < 0 {
            return None;
        }
        while y >= 0 && !image.get(center_x, y as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            y -= 1;
        }
        if y < 0 || state_count[1] > max_count {
            return None;
        }
        while y >= 0 && image.get(center_x, y as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            y -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut y = start_y + 1;
        while y < max_y && image.get(center_x, y) {
            state_count[2] += 1;
            y += 1;
        }
        if y == max_y {
            return None;
        }
        while y < max_y && !image.get(center_x, y) && state_count[3] < max_count {
            state_count[3] += 1;
            y += 1;
        }
        if y == max_y || state_count[3] >= max_count {
            return None;
        }
        while y < max_y && image.get(center_x, y) && state_count[4] < max_count {
            state_count[4] += 1;
            y += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        // The column span must roughly match the row span.
        let total: usize = state_count.iter().sum();
        if 5 * total.abs_diff(original_total) >= 2 * original_total {
            return None;
        }

        Self::found_pattern_cross(&state_count)
            .then(|| Self::center_from_end(&state_count, y))
    }

    /// Like the vertical check, re-walking the row through the refined
    /// center to tighten the column estimate.
    fn cross_check_horizontal(
        &self,
        start_x: usize,
        center_y: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f64> {
        let image = self.image;
        let max_x = image.width();
        let mut state_count = [0usize; 5];

        let mut x = start_x as isize;
        while x >= 0 && image.get(x as usize, center_y) {
            state_count[2] += 1;
            x -= 1;
        }
        if x < 0 {
            return None;
        }
        while x >= 0 && !image.get(x as usize, center_y) && state_count[1] <= max_count {
            state_count[1] += 1;
            x -= 1;
        }
        if x < 0 || state_count[1] > max_count {
            return None;
        }
        while x >= 0 && image.get(x as usize, center_y) && state_count[0] <= max_count {
            state_count[0] += 1;
            x -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut x = start_x + 1;
        while x < max_x && image.get(x, center_y) {
            state_count[2] += 1;
            x += 1;
        }
        if x == max_x {
            return None;
        }
        while x < max_x && !image.get(x, center_y) && state_count[3] < max_count {
            state_count[3] += 1;
            x += 1;
        }
        if x == max_x || state_count[3] >= max_count {
            return None;
        }
        while x < max_x && image.get(x, center_y) && state_count[4] < max_count {
            state_count[4] += 1;
            x += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        let total: usize = state_count.iter().sum();
        if 5 * total.abs_diff(original_total) >= original_total {
            return None;
        }

        Self::found_pattern_cross(&state_count)
            .then(|| Self::center_from_end(&state_count, x))
    }

    /// Walk the main diagonal through the center for extra robustness
    /// against speckle that survives both axis checks.
    fn cross_check_diagonal(&self, center_x: usize, center_y: usize) -> bool {
        let image = self.image;
        let mut state_count = [0usize; 5];

        let mut i = 0usize;
        while center_x >= i && center_y >= i && image.get(center_x - i, center_y - i) {
            state_count[2] += 1;
            i += 1;
        }
        if center_x < i || center_y < i {
            return false;
        }
        while center_x >= i && center_y >= i && !image.get(center_x - i, center_y - i) {
            state_count[1] += 1;
            i += 1;
        }
        if center_x < i || center_y < i {
            return false;
        }
        while center_x >= i && center_y >= i && image.get(center_x - i, center_y - i) {
            state_count[0] += 1;
            i += 1;
        }

        let max_x = image.width();
        let max_y = image.height();
        let mut i = 1usize;
        while center_x + i < max_x && center_y + i < max_y && image.get(center_x + i, center_y + i)
        {
            state_count[2] += 1;
            i += 1;
        }
        while center_x + i < max_x
            && center_y + i < max_y
            && !image.get(center_x + i, center_y + i)
        {
            state_count[3] += 1;
            i += 1;
        }
        while center_x + i < max_x && center_y + i < max_y && image.get(center_x + i, center_y + i)
        {
            state_count[4] += 1;
            i += 1;
        }

        Self::found_pattern_diagonal(&state_count)
    }

    /// Run all cross-checks on a horizontal candidate and merge it into the
    /// candidate list. Returns true when the candidate survived.
    fn handle_possible_center(
        &mut self,
        state_count: &[usize; 5],
        y: usize,
        end_x: usize,
    ) -> bool {
        let total: usize = state_count.iter().sum();
        let mut center_x = Self::center_from_end(state_count, end_x);
        let Some(center_y) =
            self.cross_check_vertical(y, center_x.trunc() as usize, state_count[2], total)
        else {
            return false;
        };
        let Some(refined_x) = self.cross_check_horizontal(
            center_x.trunc() as usize,
            center_y.trunc() as usize,
            state_count[2],
            total,
        ) else {
            return false;
        };
        center_x = refined_x;
        if !self.cross_check_diagonal(center_x.trunc() as usize, center_y.trunc() as usize) {
            return false;
        }

        let estimated_module_size = total as f64 / 7.0;
        let mut merged = false;
        for center in &mut self.possible_centers {
            if center.about_equals(estimated_module_size, center_x, center_y) {
                *center = center.combine_estimate(center_x, center_y, estimated_module_size);
                merged = true;
                break;
            }
        }
        if !merged {
            self.possible_centers
                .push(FinderPattern::new(center_x, center_y, estimated_module_size));
        }
        true
    }

    /// True once three candidates are confirmed (quorum sightings) with
    /// module sizes agreeing within 5%.
    fn have_multiply_confirmed_centers(&self) -> bool {
        let mut confirmed = 0usize;
        let mut total_module_size = 0.0;
        for center in &self.possible_centers {
            if center.count >= CENTER_QUORUM {
                confirmed += 1;
                total_module_size += center.module_size;
            }
        }
        if confirmed < 3 {
            return false;
        }
        let average = total_module_size / self.possible_centers.len() as f64;
        let total_deviation: f64 = self
            .possible_centers
            .iter()
            .map(|c| (c.module_size - average).abs())
            .sum();
        total_deviation <= 0.05 * total_module_size
    }

    /// With two confirmed centers the third must start at a predictable
    /// distance; returns how many rows can be skipped to get there.
    fn find_row_skip(&mut self) -> usize {
        if self.possible_centers.len() <= 1 {
            return 0;
        }
        let mut first: Option<&FinderPattern> = None;
        for center in &self.possible_centers {
            if center.count >= CENTER_QUORUM {
                match first {
                    None => first = Some(center),
                    Some(f) => {
                        self.has_skipped = true;
                        let dx = (f.position.x - center.position.x).abs();
                        let dy = (f.position.y - center.position.y).abs();
                        return ((dx - dy) / 2.0).max(0.0) as usize;
                    }
                }
            }
        }
        0
    }
}

/// Drop the oldest dark/light run pair, keeping the tail of the state
/// machine valid after a failed 1:1:3:1:1 test.
fn shift_counts_back(state_count: &mut [usize; 5]) {
    state_count[0] = state_count[2];
    state_count[1] = state_count[3];
    state_count[2] = state_count[4];
    state_count[3] = 1;
    state_count[4] = 0;
}

/// Pairwise module sizes within 1.5× and an approximately right-isosceles
/// layout: near-equal legs with the longest edge close to √2 of them.
fn is_valid_triplet(patterns: &[FinderPattern; 3]) -> bool {
    let sizes = [
        patterns[0].module_size,
        patterns[1].module_size,
        patterns[2].module_size,
    ];
    let min_size = sizes.iter().copied().fold(f64::INFINITY, f64::min);
    let max_size = sizes.iter().copied().fold(0.0, f64::max);
    if min_size <= 0.0 || max_size > min_size * MAX_SIZE_RATIO {
        return false;
    }

    let mut d = [
        distance(&patterns[0], &patterns[1]),
        distance(&patterns[0], &patterns[2]),
        distance(&patterns[1], &patterns[2]),
    ];
    d.sort_by(f64::total_cmp);
    if d[0] <= 0.0 || d[1] / d[0] > MAX_LEG_RATIO {
        return false;
    }
    let hypotenuse_ratio = d[2] / (0.5 * (d[0] + d[1]));
    (hypotenuse_ratio - std::f64::consts::SQRT_2).abs() < HYPOTENUSE_TOLERANCE
}

/// Relative spread of the three module-size estimates; lower is better.
fn size_consistency_score(patterns: &[FinderPattern; 3]) -> f64 {
    let sizes = [
        patterns[0].module_size,
        patterns[1].module_size,
        patterns[2].module_size,
    ];
    let mean = sizes.iter().sum::<f64>() / 3.0;
    let variance = sizes.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / 3.0;
    variance.sqrt() / mean
}
