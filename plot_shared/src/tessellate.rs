//! Tessellation: sampling a function definition or a histogram on a grid.
//!
//! Evaluated `(x, y, z)` maps to world `(x, z, y)`: the evaluated `z` is the
//! vertical axis. A node that fails to evaluate is stored as NaN and only
//! knocks out the quads or segments touching it.

use tracing::debug;

use crate::{error::SceneError, expr::ExpressionEvaluator, math::Vec3};

/// Canonical domain `x` and `y` are seeded over before evaluation.
pub const DOMAIN: (f64, f64) = (-1.0, 1.0);

/// Sampled points, row-major in `u`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGrid {
    divs_u: usize,
    divs_v: usize,
    points: Vec<Vec3>,
}

impl PointGrid {
    pub fn new(divs_u: usize, divs_v: usize, points: Vec<Vec3>) -> Self {
        debug_assert_eq!(points.len(), divs_u * divs_v);
        Self {
            divs_u,
            divs_v,
            points,
        }
    }

    pub fn divs_u(&self) -> usize {
        self.divs_u
    }

    pub fn divs_v(&self) -> usize {
        self.divs_v
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.divs_u, self.divs_v)
    }

    pub fn get(&self, i: usize, j: usize) -> Vec3 {
        self.points[i * self.divs_v + j]
    }

    /// The four corners of cell `(i, j)` in winding order.
    pub fn quad(&self, i: usize, j: usize) -> [Vec3; 4] {
        [
            self.get(i, j),
            self.get(i + 1, j),
            self.get(i + 1, j + 1),
            self.get(i, j + 1),
        ]
    }

    /// Every grid edge exactly once: along `u`, then along `v`, per node.
    /// For a single-column curve grid these are the consecutive segments.
    pub fn edges(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        (0..self.divs_u).flat_map(move |i| {
            (0..self.divs_v).flat_map(move |j| {
                let along_u = (i + 1 < self.divs_u).then(|| (self.get(i, j), self.get(i + 1, j)));
                let along_v = (j + 1 < self.divs_v).then(|| (self.get(i, j), self.get(i, j + 1)));
                along_u.into_iter().chain(along_v)
            })
        })
    }

    /// Lower-corner indices of every cell.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let cells_v = self.divs_v.saturating_sub(1);
        (0..self.divs_u.saturating_sub(1)).flat_map(move |i| (0..cells_v).map(move |j| (i, j)))
    }

    pub fn nan_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_nan()).count()
    }
}

/// A sampled grid plus its length (curves) or area (surfaces) estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Tessellation {
    pub grid: PointGrid,
    pub measure: f64,
}

/// Samples a definition over `divs_u x divs_v` nodes (`divs_u x 1` for a
/// curve). Binds `u, v, x, y, z, uSteps, vSteps` for every node.
pub fn tessellate_expression(
    expression: &str,
    divs_u: usize,
    divs_v: usize,
    is_curve: bool,
    evaluator: &mut dyn ExpressionEvaluator,
) -> Tessellation {
    let divs_v = if is_curve { 1 } else { divs_v };
    let mut points = Vec::with_capacity(divs_u * divs_v);
    let mut failures = 0usize;

    evaluator.bind("uSteps", divs_u as f64);
    evaluator.bind("vSteps", divs_v as f64);

    for i in 0..divs_u {
        let u = fraction(i, divs_u);
        for j in 0..divs_v {
            let v = fraction(j, divs_v);
            evaluator.bind("u", u);
            evaluator.bind("v", v);
            evaluator.bind("x", DOMAIN.0 + (DOMAIN.1 - DOMAIN.0) * u);
            evaluator.bind("y", DOMAIN.0 + (DOMAIN.1 - DOMAIN.0) * v);
            evaluator.bind("z", 0.0);
            match evaluator.evaluate(expression) {
                Ok([x, y, z]) => points.push(Vec3::new(x, z, y)),
                Err(e) => {
                    if failures == 0 {
                        debug!(u, v, error = %e, "Grid node failed to evaluate");
                    }
                    failures += 1;
                    points.push(Vec3::NAN);
                }
            }
        }
    }

    if failures > 0 {
        debug!(failures, expression, "Tessellated with failed nodes");
    }

    let grid = PointGrid::new(divs_u, divs_v, points);
    let measure = if is_curve {
        curve_length(&grid)
    } else {
        surface_area(&grid)
    };
    Tessellation { grid, measure }
}

fn fraction(i: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        i as f64 / (n - 1) as f64
    }
}

/// Sum of consecutive sample distances along `u`, skipping NaN pairs.
pub fn curve_length(grid: &PointGrid) -> f64 {
    (1..grid.divs_u)
        .map(|i| (grid.get(i - 1, 0), grid.get(i, 0)))
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| a.distance(b))
        .sum()
}

/// Two triangles per quad; quads touching a NaN node are skipped.
pub fn surface_area(grid: &PointGrid) -> f64 {
    let mut area = 0.0;
    for i in 0..grid.divs_u.saturating_sub(1) {
        for j in 0..grid.divs_v.saturating_sub(1) {
            let [a, b, c, d] = grid.quad(i, j);
            if [a, b, c, d].iter().any(|p| p.is_nan()) {
                continue;
            }
            area += (b - a).cross(c - a).len() / 2.0;
            area += (c - a).cross(d - a).len() / 2.0;
        }
    }
    area
}

/// Histogram heights laid out as `rows x cols` bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinGrid {
    heights: Vec<Vec<f64>>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Explicit vertical range; auto-scaled from the data when `None`.
    pub fixed_z: Option<(f64, f64)>,
}

impl BinGrid {
    /// Builds a grid; every row must have the same length and there must be
    /// at least 2x2 bins.
    pub fn new(
        heights: Vec<Vec<f64>>,
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> Result<Self, SceneError> {
        let rows = heights.len();
        let cols = heights.first().map_or(0, Vec::len);
        if rows < 2 || cols < 2 || heights.iter().any(|r| r.len() != cols) {
            return Err(SceneError::BinGridTooSmall { rows, cols });
        }
        for (min, max) in [x_range, y_range] {
            if !(min < max) {
                return Err(SceneError::InvalidRange { min, max });
            }
        }
        Ok(Self {
            heights,
            x_range,
            y_range,
            fixed_z: None,
        })
    }

    pub fn with_fixed_z(mut self, min: f64, max: f64) -> Result<Self, SceneError> {
        if !(min < max) {
            return Err(SceneError::InvalidRange { min, max });
        }
        self.fixed_z = Some((min, max));
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.heights.len()
    }

    pub fn cols(&self) -> usize {
        self.heights[0].len()
    }

    pub fn height(&self, row: usize, col: usize) -> f64 {
        self.heights[row][col]
    }

    /// Smallest and largest finite bin height.
    pub fn height_bounds(&self) -> (f64, f64) {
        self.heights
            .iter()
            .flatten()
            .copied()
            .filter(|h| h.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// Vertical range to display: the fixed one, or an auto-scaled one.
    pub fn z_range(&self) -> (f64, f64) {
        if let Some(range) = self.fixed_z {
            return range;
        }
        let (lo, hi) = self.height_bounds();
        if lo > hi {
            return (0.0, 1.0);
        }
        auto_z_range(lo, hi)
    }
}

/// Samples bin centres: column `c` along world X, row `r` along world Z,
/// height on world Y. Returns the grid and the vertical display range.
pub fn tessellate_bins(bins: &BinGrid) -> (Tessellation, (f64, f64)) {
    let (cols, rows) = (bins.cols(), bins.rows());
    let dx = (bins.x_range.1 - bins.x_range.0) / cols as f64;
    let dy = (bins.y_range.1 - bins.y_range.0) / rows as f64;

    let mut points = Vec::with_capacity(cols * rows);
    for c in 0..cols {
        let x = bins.x_range.0 + (c as f64 + 0.5) * dx;
        for r in 0..rows {
            let y = bins.y_range.0 + (r as f64 + 0.5) * dy;
            let h = bins.height(r, c);
            points.push(if h.is_finite() {
                Vec3::new(x, h, y)
            } else {
                Vec3::NAN
            });
        }
    }

    let grid = PointGrid::new(cols, rows, points);
    let measure = surface_area(&grid);
    (Tessellation { grid, measure }, bins.z_range())
}

/// Smallest `1`, `2` or `5 x 10^n` that is `>= value`. Non-positive input
/// returns `0`.
pub fn nice_ceil(value: f64) -> f64 {
    if !(value > 0.0) || !value.is_finite() {
        return 0.0;
    }
    let mut exp = value.log10().floor() as i32;
    loop {
        let base = 10f64.powi(exp);
        for step in [1.0, 2.0, 5.0] {
            let candidate = step * base;
            // Tolerate log10 rounding right at a boundary.
            if candidate >= value * (1.0 - 1e-12) {
                return candidate;
            }
        }
        exp += 1;
    }
}

/// Headroom applied to the data bounds before rounding.
pub const AUTO_RANGE_HEADROOM: f64 = 1.2;

/// Rounded display range for data spanning `[min, max]`.
pub fn auto_z_range(min: f64, max: f64) -> (f64, f64) {
    let hi = nice_ceil(max * AUTO_RANGE_HEADROOM);
    let lo = -nice_ceil(-min * AUTO_RANGE_HEADROOM);
    if lo < hi {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MevalEvaluator;

    #[test]
    fn surface_grid_dims_and_axis_swap() {
        let mut ev = MevalEvaluator::new();
        let t = tessellate_expression("x=x; y=y; z=2", 4, 3, false, &mut ev);
        assert_eq!(t.grid.dims(), (4, 3));
        assert_eq!(t.grid.get(0, 0), Vec3::new(-1.0, 2.0, -1.0));
        assert_eq!(t.grid.get(3, 2), Vec3::new(1.0, 2.0, 1.0));
        // Flat 2x2 square.
        assert!((t.measure - 4.0).abs() < 1e-9);
    }

    #[test]
    fn curve_is_single_column() {
        let mut ev = MevalEvaluator::new();
        let t = tessellate_expression("x=u*3; y=0; z=0", 7, 9, true, &mut ev);
        assert_eq!(t.grid.dims(), (7, 1));
        assert!((t.measure - 3.0).abs() < 1e-9);
    }

    #[test]
    fn failed_node_is_nan_only_there() {
        let mut ev = MevalEvaluator::new();
        // x hits 0 only at the middle column of a 3-wide grid.
        let t = tessellate_expression("x=x; y=y; z=1/x", 3, 2, false, &mut ev);
        assert_eq!(t.grid.nan_count(), 2);
        assert!(t.grid.get(1, 0).is_nan() && t.grid.get(1, 1).is_nan());
        assert!(!t.grid.get(0, 0).is_nan());
        assert_eq!(t.measure, 0.0);
    }

    #[test]
    fn nice_ceil_steps() {
        assert_eq!(nice_ceil(56.4), 100.0);
        assert_eq!(nice_ceil(50.0), 50.0);
        assert_eq!(nice_ceil(3.6), 5.0);
        assert_eq!(nice_ceil(1.1), 2.0);
        assert!((nice_ceil(0.013) - 0.02).abs() < 1e-15);
        assert_eq!(nice_ceil(-2.0), 0.0);
    }

    #[test]
    fn bins_auto_scale_and_fixed_range() {
        let bins = BinGrid::new(
            vec![vec![-3.0, 10.0], vec![47.0, 0.0]],
            (0.0, 2.0),
            (0.0, 4.0),
        )
        .unwrap();
        let (t, range) = tessellate_bins(&bins);
        assert_eq!(range, (-5.0, 100.0));
        assert_eq!(t.grid.dims(), (2, 2));
        assert_eq!(t.grid.get(0, 1), Vec3::new(0.5, 47.0, 3.0));

        let fixed = bins.with_fixed_z(-1.0, 1.0).unwrap();
        assert_eq!(tessellate_bins(&fixed).1, (-1.0, 1.0));
    }

    #[test]
    fn ragged_bins_rejected() {
        let err = BinGrid::new(vec![vec![1.0, 2.0], vec![1.0]], (0.0, 1.0), (0.0, 1.0));
        assert!(err.is_err());
    }
}
