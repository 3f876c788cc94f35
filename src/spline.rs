/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Cubic-spline resampling of sparse (mode, frequency) samples.
//!
//! A simulation yields a few dozen eigenfrequencies at integer (or otherwise
//! sparse) azimuthal mode numbers. [`resample`] fits a C² cubic spline through
//! them and evaluates it on a dense uniform grid, which is what the finite
//! differences in [`crate::dispersion`] need.
//!
//! # Algorithm
//!
//! The spline is solved in slope form: unknown first derivatives `s[i]` at
//! each knot satisfy a tridiagonal system (continuity of the second
//! derivative at interior knots, plus one end condition per side). Each
//! interval then becomes a cubic Hermite segment.
//!
//! End conditions:
//! - [`SplineBoundary::NotAKnot`] — third derivative continuous across the
//!   second and penultimate knots. Four points give a single cubic.
//! - [`SplineBoundary::Natural`] — zero second derivative at both ends.
//!
//! Evaluation outside the knot range extrapolates the end segments.

use crate::error::{ConfigError, CurveError};

/// Fewest points that determine a cubic spline.
pub const MIN_SPLINE_POINTS: usize = 4;

// ─── SplineBoundary ──────────────────────────────────────────────────────────

/// End condition of the interpolating spline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplineBoundary {
    /// Third derivative continuous at the second and penultimate knots.
    #[default]
    NotAKnot,
    /// Second derivative zero at both ends.
    Natural,
}

// ─── CubicSpline ─────────────────────────────────────────────────────────────

/// Piecewise cubic interpolant through strictly increasing knots.
#[derive(Clone, Debug, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    /// Per interval: `[a, b, c, d]` of `a·u³ + b·u² + c·u + d`, `u = x − knots[i]`.
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Fit a spline through `(x[i], y[i])`.
    ///
    /// Fails when the inputs differ in length, hold fewer than
    /// [`MIN_SPLINE_POINTS`] points, contain non-finite values, or `x` is not
    /// strictly increasing.
    pub fn fit(x: &[f64], y: &[f64], boundary: SplineBoundary) -> Result<Self, CurveError> {
        validate_knots(x, y)?;
        let n = x.len();

        let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<f64> = y
            .windows(2)
            .zip(&dx)
            .map(|(w, h)| (w[1] - w[0]) / h)
            .collect();

        // Tridiagonal system in the knot slopes: lower, diagonal, upper, rhs.
        let mut lower = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        for i in 1..n - 1 {
            lower[i] = dx[i];
            diag[i] = 2.0 * (dx[i - 1] + dx[i]);
            upper[i] = dx[i - 1];
            rhs[i] = 3.0 * (dx[i] * slope[i - 1] + dx[i - 1] * slope[i]);
        }

        match boundary {
            SplineBoundary::NotAKnot => {
                let d = x[2] - x[0];
                diag[0] = dx[1];
                upper[0] = d;
                rhs[0] = ((dx[0] + 2.0 * d) * dx[1] * slope[0] + dx[0] * dx[0] * slope[1]) / d;

                let d = x[n - 1] - x[n - 3];
                let (h_last, h_prev) = (dx[n - 2], dx[n - 3]);
                diag[n - 1] = h_prev;
                lower[n - 1] = d;
                rhs[n - 1] = (h_last * h_last * slope[n - 3]
                    + (2.0 * d + h_last) * h_prev * slope[n - 2])
                    / d;
            }
            SplineBoundary::Natural => {
                diag[0] = 2.0;
                upper[0] = 1.0;
                rhs[0] = 3.0 * slope[0];

                diag[n - 1] = 2.0;
                lower[n - 1] = 1.0;
                rhs[n - 1] = 3.0 * slope[n - 2];
            }
        }

        let s = solve_tridiagonal(&lower, &mut diag, &upper, &mut rhs);

        let coeffs = (0..n - 1)
            .map(|i| {
                let t = (s[i] + s[i + 1] - 2.0 * slope[i]) / dx[i];
                [t / dx[i], (slope[i] - s[i]) / dx[i] - t, s[i], y[i]]
            })
            .collect();

        Ok(Self {
            knots: x.to_vec(),
            coeffs,
        })
    }

    /// Knot positions.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Evaluate at a single point.
    pub fn evaluate(&self, x: f64) -> f64 {
        let i = self
            .knots
            .partition_point(|&k| k <= x)
            .saturating_sub(1)
            .min(self.coeffs.len() - 1);
        self.segment(i, x)
    }

    /// Evaluate at every point of a non-decreasing sequence in one sweep.
    pub fn evaluate_sorted(&self, xs: &[f64]) -> Vec<f64> {
        let last = self.coeffs.len() - 1;
        let mut i = 0;
        xs.iter()
            .map(|&x| {
                while i < last && self.knots[i + 1] <= x {
                    i += 1;
                }
                self.segment(i, x)
            })
            .collect()
    }

    #[inline]
    fn segment(&self, i: usize, x: f64) -> f64 {
        let [a, b, c, d] = self.coeffs[i];
        let u = x - self.knots[i];
        ((a * u + b) * u + c) * u + d
    }
}

fn validate_knots(x: &[f64], y: &[f64]) -> Result<(), CurveError> {
    if x.len() != y.len() {
        return Err(CurveError::LengthMismatch {
            modes: x.len(),
            freqs: y.len(),
        });
    }
    if x.len() < MIN_SPLINE_POINTS {
        return Err(CurveError::InsufficientSamples {
            got: x.len(),
            required: MIN_SPLINE_POINTS,
        });
    }
    if let Some(position) = x
        .iter()
        .zip(y)
        .position(|(a, b)| !(a.is_finite() && b.is_finite()))
    {
        return Err(CurveError::NonFiniteInput { position });
    }
    if let Some(position) = x.windows(2).position(|w| w[1] <= w[0]) {
        return Err(CurveError::NonMonotonicInput {
            position: position + 1,
        });
    }
    Ok(())
}

/// Thomas algorithm. Consumes `diag` and `rhs` as scratch; returns the solution.
///
/// Strictly increasing knots keep every pivot non-zero for both end conditions.
fn solve_tridiagonal(lower: &[f64], diag: &mut [f64], upper: &[f64], rhs: &mut [f64]) -> Vec<f64> {
    let n = diag.len();
    for i in 1..n {
        let w = lower[i] / diag[i - 1];
        diag[i] -= w * upper[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }
    let mut out = vec![0.0; n];
    out[n - 1] = rhs[n - 1] / diag[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = (rhs[i] - upper[i] * out[i + 1]) / diag[i];
    }
    out
}

// ─── Uniform resampling ──────────────────────────────────────────────────────

/// Uniform grid from `start` to `stop` inclusive, `count >= 2` points.
///
/// The last point is pinned to `stop` exactly.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    let step = (stop - start) / (count - 1) as f64;
    let mut grid: Vec<f64> = (0..count).map(|i| i as f64 * step + start).collect();
    if let Some(last) = grid.last_mut() {
        *last = stop;
    }
    grid
}

/// A spline fit plus its dense uniform evaluation.
#[derive(Clone, Debug)]
pub struct ResampledCurve {
    /// The fitted interpolant.
    pub spline: CubicSpline,
    /// Uniform abstract-mode grid spanning `[min(modes), max(modes)]`.
    pub modes: Vec<f64>,
    /// Spline value at each grid point.
    pub frequencies: Vec<f64>,
    /// Grid spacing `(max − min) / (grid_size − 1)`.
    pub step: f64,
}

/// Fit `freqs` against `modes` and resample on `grid_size` uniform points.
pub fn resample(
    modes: &[f64],
    freqs: &[f64],
    grid_size: usize,
    boundary: SplineBoundary,
) -> Result<ResampledCurve, CurveError> {
    if grid_size < 2 {
        return Err(ConfigError::new("grid_size", format!("need at least 2 grid points, got {grid_size}")).into());
    }
    let spline = CubicSpline::fit(modes, freqs, boundary)?;
    let (lo, hi) = (modes[0], modes[modes.len() - 1]);
    let grid = linspace(lo, hi, grid_size);
    let frequencies = spline.evaluate_sorted(&grid);
    Ok(ResampledCurve {
        spline,
        modes: grid,
        frequencies,
        step: (hi - lo) / (grid_size - 1) as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(x: f64) -> f64 {
        0.5 * x * x * x - 2.0 * x * x + x + 5.0
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn not_a_knot_reproduces_a_cubic() {
        let x: Vec<f64> = vec![0.0, 0.7, 1.5, 3.0, 3.2, 5.0];
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let s = CubicSpline::fit(&x, &y, SplineBoundary::NotAKnot).unwrap();
        for &probe in &[0.1, 1.0, 2.2, 3.1, 4.4, 4.99] {
            assert!(close(s.evaluate(probe), cubic(probe), 1e-10), "at {probe}");
        }
    }

    #[test]
    fn four_points_give_the_interpolating_cubic() {
        let x = [1.0, 2.0, 4.0, 7.0];
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let s = CubicSpline::fit(&x, &y, SplineBoundary::NotAKnot).unwrap();
        assert!(close(s.evaluate(5.5), cubic(5.5), 1e-10));
    }

    #[test]
    fn passes_through_knots() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 1.3).collect();
        let y: Vec<f64> = x.iter().map(|v| (v * 0.9).sin() * 10.0).collect();
        for boundary in [SplineBoundary::NotAKnot, SplineBoundary::Natural] {
            let s = CubicSpline::fit(&x, &y, boundary).unwrap();
            for (xi, yi) in x.iter().zip(&y) {
                assert!(close(s.evaluate(*xi), *yi, 1e-12), "{boundary:?} at {xi}");
            }
        }
    }

    #[test]
    fn natural_spline_of_a_line_is_the_line() {
        let x = [0.0, 1.0, 2.5, 4.0, 6.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let s = CubicSpline::fit(&x, &y, SplineBoundary::Natural).unwrap();
        assert!(close(s.evaluate(3.3), 3.0 * 3.3 - 1.0, 1e-12));
    }

    #[test]
    fn sorted_sweep_matches_point_evaluation() {
        let x: Vec<f64> = (0..8).map(|i| (i * i) as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sqrt()).collect();
        let s = CubicSpline::fit(&x, &y, SplineBoundary::NotAKnot).unwrap();
        let grid = linspace(0.0, 49.0, 301);
        let swept = s.evaluate_sorted(&grid);
        for (g, v) in grid.iter().zip(&swept) {
            assert_eq!(*v, s.evaluate(*g));
        }
    }

    #[test]
    fn resample_spans_the_input_range() {
        let modes: Vec<f64> = (100..=120).map(f64::from).collect();
        let freqs: Vec<f64> = modes.iter().map(|m| 2.7e12 * m).collect();
        let r = resample(&modes, &freqs, 20_000, SplineBoundary::NotAKnot).unwrap();
        assert_eq!(r.modes.len(), 20_000);
        assert_eq!(r.frequencies.len(), 20_000);
        assert_eq!(r.modes[0], 100.0);
        assert_eq!(r.modes[19_999], 120.0);
        assert!(close(r.step, 20.0 / 19_999.0, 1e-15));
    }

    #[test]
    fn too_few_points_rejected() {
        let err = CubicSpline::fit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], SplineBoundary::NotAKnot)
            .unwrap_err();
        assert_eq!(err, CurveError::InsufficientSamples { got: 3, required: 4 });
    }

    #[test]
    fn repeated_mode_rejected() {
        let err = CubicSpline::fit(
            &[1.0, 2.0, 2.0, 3.0, 4.0],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            SplineBoundary::NotAKnot,
        )
        .unwrap_err();
        assert_eq!(err, CurveError::NonMonotonicInput { position: 2 });
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = CubicSpline::fit(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0], SplineBoundary::Natural)
            .unwrap_err();
        assert!(matches!(err, CurveError::LengthMismatch { modes: 4, freqs: 3 }));
    }

    #[test]
    fn nan_rejected() {
        let err = CubicSpline::fit(
            &[1.0, 2.0, 3.0, 4.0],
            &[1.0, f64::NAN, 3.0, 4.0],
            SplineBoundary::Natural,
        )
        .unwrap_err();
        assert_eq!(err, CurveError::NonFiniteInput { position: 1 });
    }
}
