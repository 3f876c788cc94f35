/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Residual (integrated) dispersion of a resonator mode family.
//!
//! # In plain terms
//!
//! Resonances of a ring sit on an almost regular comb. Pick the comb tooth
//! nearest the pump frequency, draw the perfectly regular comb through it
//! (spacing = local free spectral range), and measure how far every real
//! resonance drifts from its regular counterpart. That drift, folded into one
//! free spectral range, is the residual dispersion `Δω`.
//!
//! # Steps
//!
//! 1. Forward differences `D1 = Δω/h`, `D2 = ΔD1/h`; drop the last grid point.
//! 2. Two-stage anchor search: the integer mode whose interpolated frequency is
//!    nearest the reference, then the dense grid point nearest that mode.
//! 3. Linear reference `ω0 + D1·(m − m0)`.
//! 4. Residual modulo `D1`, unwrapped into `(−D1/2, D1/2]`.
//! 5. Tail trim: drop everything up to the highest-frequency point below the
//!    reference whose residual exceeds the tolerance. Derivatives are kept whole.
//!
//! # Invariants
//!
//! - `frequency`, `residual` and `modes` share one index space after trimming.
//! - Every residual lies in `(−D1/2, D1/2]` for positive anchor slope.
//! - The anchor survives trimming, otherwise the curve is rejected.
//!
//! The single-stage nearest-frequency anchor without trimming produces
//! different numbers for the same input and is not supported; persisted
//! corpora carry [`ALGORITHM_VERSION`] to keep the two apart.

use crate::config::DispersionConfig;
use crate::error::CurveError;
use crate::spline::{resample, CubicSpline, ResampledCurve};

/// Version of the anchor and trim rules implemented here.
pub const ALGORITHM_VERSION: u16 = 2;

// ─── Anchor ──────────────────────────────────────────────────────────────────

/// Grid point every residual is measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    /// Index into the untrimmed grid (length `grid_size − 1`).
    pub index: usize,
    /// Integer mode picked by the coarse search.
    pub integer_mode: f64,
    /// Abstract mode at `index`.
    pub mode: f64,
    /// Frequency at `index`, Hz.
    pub frequency: f64,
    /// First derivative at `index`, Hz per mode: the local free spectral range.
    pub slope: f64,
}

// ─── DispersionCurve ─────────────────────────────────────────────────────────

/// Output of [`compute`].
#[derive(Clone, Debug, PartialEq)]
pub struct DispersionCurve {
    /// Abstract mode of each remaining point.
    pub modes: Vec<f64>,
    /// Resampled frequency of each remaining point, Hz.
    pub frequency: Vec<f64>,
    /// Residual dispersion of each remaining point, Hz.
    pub residual: Vec<f64>,
    /// First derivative on the full grid, length `grid_size − 1`.
    pub first_derivative: Vec<f64>,
    /// Second derivative on the full grid, length `grid_size − 2`.
    pub second_derivative: Vec<f64>,
    /// Reference point.
    pub anchor: Anchor,
    /// Number of low-frequency points removed by the tail trim.
    pub trimmed: usize,
}

impl DispersionCurve {
    /// Number of points left to draw.
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    /// `true` when no point is left. [`compute`] never returns such a curve.
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
}

/// Resample sparse samples and compute their dispersion in one call.
pub fn from_samples(
    modes: &[f64],
    freqs: &[f64],
    config: &DispersionConfig,
) -> Result<DispersionCurve, CurveError> {
    config.validate()?;
    let resampled = resample(modes, freqs, config.grid_size, config.boundary)?;
    compute(&resampled, config)
}

/// Compute derivatives, anchor, residuals and tail trim on a resampled curve.
pub fn compute(
    resampled: &ResampledCurve,
    config: &DispersionConfig,
) -> Result<DispersionCurve, CurveError> {
    let h = resampled.step;
    let first_derivative: Vec<f64> = resampled
        .frequencies
        .windows(2)
        .map(|w| (w[1] - w[0]) / h)
        .collect();
    let second_derivative: Vec<f64> = first_derivative
        .windows(2)
        .map(|w| (w[1] - w[0]) / h)
        .collect();

    let kept = first_derivative.len();
    let modes = &resampled.modes[..kept];
    let omega = &resampled.frequencies[..kept];

    let anchor = locate_anchor(
        &resampled.spline,
        modes,
        omega,
        &first_derivative,
        config.reference_frequency_hz,
    )?;
    let residual = residuals(modes, omega, &anchor);

    let start = trim_start(
        omega,
        &residual,
        anchor.index,
        config.reference_frequency_hz,
        config.residual_tolerance_hz,
    )?;

    Ok(DispersionCurve {
        modes: modes[start..].to_vec(),
        frequency: omega[start..].to_vec(),
        residual: residual[start..].to_vec(),
        first_derivative,
        second_derivative,
        anchor,
        trimmed: start,
    })
}

// ─── Anchor search ───────────────────────────────────────────────────────────

/// Index of the first minimum. Inputs are finite.
fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn locate_anchor(
    spline: &CubicSpline,
    modes: &[f64],
    omega: &[f64],
    first_derivative: &[f64],
    reference: f64,
) -> Result<Anchor, CurveError> {
    let (min_hz, max_hz) = omega
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &w| (lo.min(w), hi.max(w)));
    if !(min_hz <= reference && reference <= max_hz) {
        return Err(CurveError::NoAnchorCandidate {
            reference_hz: reference,
            min_hz,
            max_hz,
        });
    }

    // Coarse: physical integer modes only.
    let knots = spline.knots();
    let first = knots[0].round() as i64;
    let last = knots[knots.len() - 1].round() as i64;
    let candidates: Vec<f64> = (first..=last).map(|m| m as f64).collect();
    let coarse = argmin(
        candidates
            .iter()
            .map(|&m| (reference - spline.evaluate(m)).abs()),
    )
    .ok_or(CurveError::NoAnchorCandidate {
        reference_hz: reference,
        min_hz,
        max_hz,
    })?;
    let integer_mode = candidates[coarse];

    // Fine: dense grid point nearest that mode.
    let index = argmin(modes.iter().map(|&m| (m - integer_mode).abs())).ok_or(
        CurveError::NoAnchorCandidate {
            reference_hz: reference,
            min_hz,
            max_hz,
        },
    )?;

    let slope = first_derivative[index];
    if !(slope.is_finite() && slope != 0.0) {
        return Err(CurveError::DegenerateAnchorSlope { index, slope });
    }

    Ok(Anchor {
        index,
        integer_mode,
        mode: modes[index],
        frequency: omega[index],
        slope,
    })
}

// ─── Residuals ───────────────────────────────────────────────────────────────

/// Floored modulo: the result takes the sign of `b`.
fn floored_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r == 0.0 {
        0.0f64.copysign(b)
    } else if (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// Sign with `sign(0) == 0`.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Fold `raw` into one slope period and unwrap into `(−slope/2, slope/2]`.
fn unwrap_residual(raw: f64, slope: f64) -> f64 {
    let delta = floored_mod(raw, slope);
    let half = slope / 2.0;
    let wrapped = if delta.abs() > half { 1.0 } else { 0.0 };
    delta - sign(delta - half) * slope * wrapped
}

fn residuals(modes: &[f64], omega: &[f64], anchor: &Anchor) -> Vec<f64> {
    modes
        .iter()
        .zip(omega)
        .map(|(&m, &w)| {
            let grid = anchor.frequency + anchor.slope * (m - anchor.mode);
            unwrap_residual(w - grid, anchor.slope)
        })
        .collect()
}

// ─── Tail trim ───────────────────────────────────────────────────────────────

/// First index that survives the tail trim.
///
/// Among points below `reference` whose residual magnitude exceeds
/// `tolerance`, the one with the highest frequency marks the trim boundary;
/// it and everything before it are dropped.
fn trim_start(
    omega: &[f64],
    residual: &[f64],
    anchor: usize,
    reference: f64,
    tolerance: f64,
) -> Result<usize, CurveError> {
    let mut worst: Option<(usize, f64)> = None;
    for (i, (&w, &d)) in omega.iter().zip(residual).enumerate() {
        if w < reference && d.abs() > tolerance {
            match worst {
                Some((_, best)) if w <= best => {}
                _ => worst = Some((i, w)),
            }
        }
    }
    let Some((trim_end, _)) = worst else {
        return Ok(0);
    };
    if trim_end + 1 >= omega.len() {
        return Err(CurveError::EmptyCurve);
    }
    if trim_end >= anchor {
        return Err(CurveError::AnchorTrimmed { anchor, trim_end });
    }
    Ok(trim_end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: f64 = 282e12;
    const FSR: f64 = 1e12;

    /// Mode family centred on mode 110 at the reference frequency.
    fn family(curvature: f64) -> (Vec<f64>, Vec<f64>) {
        let modes: Vec<f64> = (100..=120).map(f64::from).collect();
        let freqs = modes
            .iter()
            .map(|m| T0 + FSR * (m - 110.0) + curvature * (m - 110.0).powi(2))
            .collect();
        (modes, freqs)
    }

    #[test]
    fn floored_mod_follows_divisor_sign() {
        assert_eq!(floored_mod(7.0, 3.0), 1.0);
        assert_eq!(floored_mod(-7.0, 3.0), 2.0);
        assert_eq!(floored_mod(7.0, -3.0), -2.0);
        assert_eq!(floored_mod(6.0, 3.0), 0.0);
    }

    #[test]
    fn unwrap_lands_in_half_open_period() {
        let slope = 1.0e12;
        for k in -2000..=2000 {
            let raw = k as f64 * 7.3e9;
            let d = unwrap_residual(raw, slope);
            assert!(d > -slope / 2.0 && d <= slope / 2.0, "raw {raw} -> {d}");
        }
        assert_eq!(unwrap_residual(slope / 2.0, slope), slope / 2.0);
    }

    #[test]
    fn anchor_sits_on_reference_mode() {
        let (modes, freqs) = family(1e9);
        let curve = from_samples(&modes, &freqs, &DispersionConfig::default()).unwrap();
        let step = 20.0 / 19_999.0;
        assert_eq!(curve.anchor.integer_mode, 110.0);
        assert!((curve.anchor.mode - 110.0).abs() <= step);
        assert_eq!(curve.residual[curve.anchor.index - curve.trimmed], 0.0);
    }

    #[test]
    fn derivative_lengths_follow_grid() {
        let (modes, freqs) = family(1e9);
        let curve = from_samples(&modes, &freqs, &DispersionConfig::default()).unwrap();
        assert_eq!(curve.first_derivative.len(), 19_999);
        assert_eq!(curve.second_derivative.len(), 19_998);
        assert_eq!(curve.trimmed, 0);
        assert_eq!(curve.len(), 19_999);
        assert_eq!(curve.modes.len(), curve.residual.len());
    }

    #[test]
    fn derivatives_track_the_analytic_family() {
        let c = 1e9;
        let (modes, freqs) = family(c);
        let curve = from_samples(&modes, &freqs, &DispersionConfig::default()).unwrap();
        let expected_slope = FSR + 2.0 * c * (curve.anchor.mode - 110.0);
        assert!((curve.anchor.slope - expected_slope).abs() / FSR < 1e-4);
        let mid = curve.second_derivative.len() / 2;
        assert!((curve.second_derivative[mid] - 2.0 * c).abs() / (2.0 * c) < 1e-2);
    }

    #[test]
    fn residuals_stay_within_half_period() {
        let (modes, freqs) = family(2e10);
        let curve = from_samples(&modes, &freqs, &DispersionConfig::default()).unwrap();
        let half = curve.anchor.slope / 2.0;
        assert!(curve.residual.iter().all(|&d| d > -half && d <= half));
    }

    #[test]
    fn diverging_low_tail_is_trimmed() {
        let (modes, freqs) = family(4e9);
        let cfg = DispersionConfig::default();
        let curve = from_samples(&modes, &freqs, &cfg).unwrap();
        assert!(curve.trimmed > 0);
        assert_eq!(curve.len(), 19_999 - curve.trimmed);
        assert_eq!(curve.first_derivative.len(), 19_999);
        // (m - 110)^2 * 4e9 > 2e11  <=>  m < 110 - sqrt(50)
        assert!(curve.modes[0] > 110.0 - 50f64.sqrt() - 1e-3);
        for (w, d) in curve.frequency.iter().zip(&curve.residual) {
            assert!(!(*w < cfg.reference_frequency_hz && d.abs() > cfg.residual_tolerance_hz));
        }
    }

    #[test]
    fn curve_above_reference_has_no_anchor() {
        let modes: Vec<f64> = (100..=120).map(f64::from).collect();
        let freqs: Vec<f64> = modes.iter().map(|m| 300e12 + FSR * (m - 100.0)).collect();
        let err = from_samples(&modes, &freqs, &DispersionConfig::default()).unwrap_err();
        assert!(matches!(err, CurveError::NoAnchorCandidate { .. }));
    }

    #[test]
    fn trim_selecting_everything_is_empty_curve() {
        let omega = [1.0, 2.0, 3.0];
        let residual = [10.0, 10.0, 10.0];
        let err = trim_start(&omega, &residual, 1, 5.0, 1.0).unwrap_err();
        assert_eq!(err, CurveError::EmptyCurve);
    }

    #[test]
    fn trim_reaching_anchor_is_rejected() {
        let omega = [1.0, 2.0, 3.0, 4.0, 6.0];
        let residual = [0.0, 0.0, 0.0, 9.0, 0.0];
        let err = trim_start(&omega, &residual, 2, 5.0, 1.0).unwrap_err();
        assert_eq!(err, CurveError::AnchorTrimmed { anchor: 2, trim_end: 3 });
    }

    #[test]
    fn trim_uses_highest_frequency_offender() {
        let omega = [1.0, 3.0, 2.0, 4.0, 6.0, 7.0];
        let residual = [9.0, 9.0, 9.0, 0.0, 0.0, 9.0];
        // Offenders below 5.0: indices 0, 1, 2; highest frequency at index 1.
        assert_eq!(trim_start(&omega, &residual, 4, 5.0, 1.0).unwrap(), 2);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (modes, freqs) = family(3e9);
        let cfg = DispersionConfig::default();
        let a = from_samples(&modes, &freqs, &cfg).unwrap();
        let b = from_samples(&modes, &freqs, &cfg).unwrap();
        assert_eq!(a, b);
    }
}
