/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Corpus-wide constants as explicit configuration.
//!
//! Every image in a corpus must be produced with the same [`PipelineConfig`];
//! images rendered under different constants are not comparable. The defaults
//! reproduce the REDE corpus (1056 designs, 62×111 images).
//!
//! # Invariants
//!
//! - The grid has at least 3 points, so both finite-difference sequences are non-empty.
//! - Crop margins leave a non-empty image and agree with `image_width`/`image_height`.
//! - Axis limits are finite and strictly increasing.

use crate::error::ConfigError;
use crate::spline::SplineBoundary;

// ─── DispersionConfig ────────────────────────────────────────────────────────

/// Constants for resampling and residual-dispersion computation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispersionConfig {
    /// Number of uniformly spaced points in the resampled grid. Default 20 000.
    pub grid_size: usize,
    /// Reference (pump) frequency the anchor is placed at, in Hz. Default 282 THz.
    pub reference_frequency_hz: f64,
    /// Residual magnitude above which low-frequency tail points are trimmed, in Hz.
    /// Default 200 GHz.
    pub residual_tolerance_hz: f64,
    /// End conditions of the interpolating spline. Default not-a-knot.
    pub boundary: SplineBoundary,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            grid_size: 20_000,
            reference_frequency_hz: 282e12,
            residual_tolerance_hz: 200e9,
            boundary: SplineBoundary::NotAKnot,
        }
    }
}

impl DispersionConfig {
    /// Check every field, reporting the first bad one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < 3 {
            return Err(ConfigError::new(
                "grid_size",
                format!("need at least 3 grid points, got {}", self.grid_size),
            ));
        }
        if !(self.reference_frequency_hz.is_finite() && self.reference_frequency_hz > 0.0) {
            return Err(ConfigError::new(
                "reference_frequency_hz",
                format!("must be finite and positive, got {}", self.reference_frequency_hz),
            ));
        }
        if !(self.residual_tolerance_hz.is_finite() && self.residual_tolerance_hz > 0.0) {
            return Err(ConfigError::new(
                "residual_tolerance_hz",
                format!("must be finite and positive, got {}", self.residual_tolerance_hz),
            ));
        }
        Ok(())
    }
}

// ─── RasterConfig ────────────────────────────────────────────────────────────

/// Constants for drawing a dispersion curve into a binary image.
///
/// The canvas models a 2×1 figure at 72 px per unit with a single axes box
/// placed by fractional margins. Points are drawn as small filled circles,
/// the canvas is cropped, and its red channel is thresholded.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RasterConfig {
    /// Canvas width in pixels before cropping.
    pub canvas_width: usize,
    /// Canvas height in pixels before cropping.
    pub canvas_height: usize,
    /// Left edge of the axes box as a fraction of canvas width.
    pub axes_left: f64,
    /// Right edge of the axes box as a fraction of canvas width.
    pub axes_right: f64,
    /// Bottom edge of the axes box as a fraction of canvas height (measured upward).
    pub axes_bottom: f64,
    /// Top edge of the axes box as a fraction of canvas height (measured upward).
    pub axes_top: f64,
    /// Horizontal axis limits in THz.
    pub x_limits_thz: (f64, f64),
    /// Vertical axis limits in GHz.
    pub y_limits_ghz: (f64, f64),
    /// Radius of a plotted point in pixels.
    pub marker_radius_px: u32,
    /// RGB colour of a plotted point. Only the red channel survives binarisation.
    pub marker_rgb: (u8, u8, u8),
    /// Rows removed from the top.
    pub crop_top: usize,
    /// Rows removed from the bottom.
    pub crop_bottom: usize,
    /// Columns removed from the left.
    pub crop_left: usize,
    /// Columns removed from the right.
    pub crop_right: usize,
    /// Pixels strictly below this intensity become 255, the rest 0.
    pub binarization_threshold: u8,
    /// Expected image width after cropping.
    pub image_width: usize,
    /// Expected image height after cropping.
    pub image_height: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            canvas_width: 144,
            canvas_height: 72,
            axes_left: 0.125,
            axes_right: 0.9,
            axes_bottom: 0.11,
            axes_top: 0.88,
            x_limits_thz: (130.0, 430.0),
            y_limits_ghz: (-500.0, 500.0),
            marker_radius_px: 1,
            marker_rgb: (31, 119, 180),
            crop_top: 5,
            crop_bottom: 5,
            crop_left: 20,
            crop_right: 13,
            binarization_threshold: 200,
            image_width: 111,
            image_height: 62,
        }
    }
}

impl RasterConfig {
    /// Check every field, reporting the first bad one.
    ///
    /// Agreement between crop margins and the expected image size is not
    /// checked here; the rasterizer reports it as
    /// [`crate::error::CurveError::RenderSizeMismatch`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::new("canvas_width", "canvas must be non-empty"));
        }
        if u32::try_from(self.canvas_width).is_err() || u32::try_from(self.canvas_height).is_err() {
            return Err(ConfigError::new("canvas_width", "canvas exceeds the bitmap size limit"));
        }
        check_limits("x_limits_thz", self.x_limits_thz)?;
        check_limits("y_limits_ghz", self.y_limits_ghz)?;
        check_fractions("axes_left", self.axes_left, self.axes_right)?;
        check_fractions("axes_bottom", self.axes_bottom, self.axes_top)?;
        if self.marker_radius_px == 0 {
            return Err(ConfigError::new("marker_radius_px", "must be at least one pixel"));
        }
        if self.crop_top + self.crop_bottom >= self.canvas_height {
            return Err(ConfigError::new(
                "crop_top",
                "vertical crop consumes the whole canvas",
            ));
        }
        if self.crop_left + self.crop_right >= self.canvas_width {
            return Err(ConfigError::new(
                "crop_left",
                "horizontal crop consumes the whole canvas",
            ));
        }
        if self.binarization_threshold == 0 {
            return Err(ConfigError::new(
                "binarization_threshold",
                "a zero threshold switches every pixel off",
            ));
        }
        Ok(())
    }
}

fn check_limits(field: &'static str, (lo, hi): (f64, f64)) -> Result<(), ConfigError> {
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(ConfigError::new(
            field,
            format!("limits must be finite and increasing, got ({lo}, {hi})"),
        ));
    }
    Ok(())
}

fn check_fractions(field: &'static str, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !((0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi) && lo < hi) {
        return Err(ConfigError::new(
            field,
            format!("axes fractions must satisfy 0 <= lo < hi <= 1, got ({lo}, {hi})"),
        ));
    }
    Ok(())
}

// ─── PipelineConfig ──────────────────────────────────────────────────────────

/// Full set of corpus-wide constants.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Resampling and dispersion constants.
    pub dispersion: DispersionConfig,
    /// Rendering constants.
    pub raster: RasterConfig,
}

impl PipelineConfig {
    /// Validate both halves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispersion.validate()?;
        self.raster.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_crop_matches_image_size() {
        let r = RasterConfig::default();
        assert_eq!(r.canvas_height - r.crop_top - r.crop_bottom, r.image_height);
        assert_eq!(r.canvas_width - r.crop_left - r.crop_right, r.image_width);
    }

    #[test]
    fn tiny_grid_rejected() {
        let cfg = DispersionConfig {
            grid_size: 2,
            ..DispersionConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "grid_size");
    }

    #[test]
    fn inverted_limits_rejected() {
        let cfg = RasterConfig {
            y_limits_ghz: (500.0, -500.0),
            ..RasterConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "y_limits_ghz");
    }

    #[test]
    fn crop_consuming_canvas_rejected() {
        let cfg = RasterConfig {
            crop_left: 100,
            crop_right: 44,
            ..RasterConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "crop_left");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_round_trip() {
        let cfg = PipelineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
