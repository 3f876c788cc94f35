/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Scatter-to-raster rendering of a residual-dispersion curve.
//!
//! The curve is drawn as a scatter of small filled circles onto an in-memory
//! RGB bitmap with fixed axis limits and hidden axes, then cropped and
//! binarised. Frequencies go on the horizontal axis in THz, residuals on the
//! vertical axis in GHz.
//!
//! # Pixel model
//!
//! - The canvas is `canvas_width × canvas_height` pixels, origin top-left.
//! - The plotting area is inset by the `axes_*` fractions, rounded to whole
//!   pixels; no mesh, labels or caption are drawn.
//! - Points outside the axis limits are dropped before drawing.
//! - After cropping, pixels whose red channel is below
//!   `binarization_threshold` become 255 ("on"), everything else 0.
//!
//! All of this is a pure function of the input and [`RasterConfig`].

use core::slice::ChunksExact;

use plotters::prelude::*;

use crate::config::RasterConfig;
use crate::dispersion::DispersionCurve;
use crate::error::{ConfigError, CurveError};

pub use image::GrayImage;

const HZ_TO_THZ: f64 = 1e-12;
const HZ_TO_GHZ: f64 = 1e-9;

const RGB_CHANNELS: usize = 3;

// ─── GrayImage helpers ───────────────────────────────────────────────────────

/// Row-oriented accessors for binary corpus images.
pub trait GrayImageExt {
    /// Number of non-zero pixels.
    fn lit_count(&self) -> usize;

    /// `(rows, columns)`.
    fn shape(&self) -> (usize, usize);

    /// Rows top to bottom as byte slices.
    fn pixel_rows(&self) -> ChunksExact<'_, u8>;
}

impl GrayImageExt for GrayImage {
    fn lit_count(&self) -> usize {
        self.as_raw().iter().filter(|&&p| p != 0).count()
    }

    fn shape(&self) -> (usize, usize) {
        (self.height() as usize, self.width() as usize)
    }

    fn pixel_rows(&self) -> ChunksExact<'_, u8> {
        self.as_raw().chunks_exact((self.width() as usize).max(1))
    }
}

fn render_error(err: impl core::fmt::Display) -> CurveError {
    CurveError::Render(err.to_string())
}

/// Inset of `fraction × extent`, rounded to whole pixels.
fn margin(fraction: f64, extent: usize) -> u32 {
    (fraction * extent as f64).round() as u32
}

// ─── CurveRasterizer ─────────────────────────────────────────────────────────

/// Renders dispersion curves with one fixed [`RasterConfig`].
#[derive(Clone, Debug)]
pub struct CurveRasterizer {
    config: RasterConfig,
}

impl CurveRasterizer {
    /// Validate `config` and build a rasterizer around it.
    pub fn new(config: RasterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The constants this rasterizer draws with.
    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Render a computed dispersion curve.
    pub fn render_curve(&self, curve: &DispersionCurve) -> Result<GrayImage, CurveError> {
        self.render(&curve.frequency, &curve.residual)
    }

    /// Render parallel frequency / residual sequences, both in Hz.
    pub fn render(&self, frequency_hz: &[f64], residual_hz: &[f64]) -> Result<GrayImage, CurveError> {
        if frequency_hz.len() != residual_hz.len() {
            return Err(CurveError::LengthMismatch {
                modes: frequency_hz.len(),
                freqs: residual_hz.len(),
            });
        }
        if frequency_hz.is_empty() {
            return Err(CurveError::EmptyCurve);
        }
        let canvas = self.draw(frequency_hz, residual_hz)?;
        self.crop_and_binarize(&canvas)
    }

    /// Scatter every in-limits point onto a white RGB canvas.
    fn draw(&self, frequency_hz: &[f64], residual_hz: &[f64]) -> Result<Vec<u8>, CurveError> {
        let c = &self.config;
        let (w, h) = (c.canvas_width, c.canvas_height);
        let (x_lo, x_hi) = c.x_limits_thz;
        let (y_lo, y_hi) = c.y_limits_ghz;
        let (r, g, b) = c.marker_rgb;
        let style = RGBColor(r, g, b).filled();
        let radius = c.marker_radius_px;

        let points = frequency_hz
            .iter()
            .zip(residual_hz)
            .map(|(&f, &d)| (f * HZ_TO_THZ, d * HZ_TO_GHZ))
            .filter(|&(x, y)| (x_lo..=x_hi).contains(&x) && (y_lo..=y_hi).contains(&y));

        let mut rgb = vec![0u8; w * h * RGB_CHANNELS];
        {
            // Canvas size fits u32: checked by RasterConfig::validate.
            let root = BitMapBackend::with_buffer(&mut rgb, (w as u32, h as u32)).into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;
            let mut chart = ChartBuilder::on(&root)
                .margin_left(margin(c.axes_left, w))
                .margin_right(margin(1.0 - c.axes_right, w))
                .margin_top(margin(1.0 - c.axes_top, h))
                .margin_bottom(margin(c.axes_bottom, h))
                .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
                .map_err(render_error)?;
            chart
                .draw_series(points.map(|p| Circle::new(p, radius, style)))
                .map_err(render_error)?;
            root.present().map_err(render_error)?;
        }
        Ok(rgb)
    }

    fn crop_and_binarize(&self, rgb: &[u8]) -> Result<GrayImage, CurveError> {
        let c = &self.config;
        let actual = (
            c.canvas_height - c.crop_top - c.crop_bottom,
            c.canvas_width - c.crop_left - c.crop_right,
        );
        let expected = (c.image_height, c.image_width);
        if actual != expected {
            return Err(CurveError::RenderSizeMismatch { expected, actual });
        }

        let stride = c.canvas_width * RGB_CHANNELS;
        let mut pixels = Vec::with_capacity(actual.0 * actual.1);
        for line in rgb.chunks_exact(stride).skip(c.crop_top).take(actual.0) {
            let kept = &line[c.crop_left * RGB_CHANNELS..(c.canvas_width - c.crop_right) * RGB_CHANNELS];
            pixels.extend(
                kept.chunks_exact(RGB_CHANNELS)
                    .map(|px| if px[0] < c.binarization_threshold { 255 } else { 0 }),
            );
        }
        GrayImage::from_raw(actual.1 as u32, actual.0 as u32, pixels)
            .ok_or_else(|| render_error("cropped buffer does not match image size"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterizer() -> CurveRasterizer {
        CurveRasterizer::new(RasterConfig::default()).unwrap()
    }

    #[test]
    fn single_point_lands_where_the_axes_put_it() {
        // 280 THz is mid-axis horizontally, 0 GHz mid-axis vertically:
        // canvas centre of the plotting area minus the crop is about (31, 53).
        let img = rasterizer().render(&[280e12], &[0.0]).unwrap();
        assert_eq!(img.shape(), (62, 111));
        let near_centre = (30..=32)
            .flat_map(|row| (52..=55).map(move |col| (row, col)))
            .any(|(row, col)| img.get_pixel(col, row).0[0] == 255);
        assert!(near_centre, "no lit pixel near (31, 53)");
        assert!(img.lit_count() <= 16, "one point lit {} pixels", img.lit_count());
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(110, 61).0[0], 0);
    }

    #[test]
    fn output_is_binary() {
        let freqs: Vec<f64> = (0..5000).map(|i| 150e12 + i as f64 * 5e10).collect();
        let res: Vec<f64> = freqs.iter().map(|f| ((f * 1e-13).sin()) * 3e11).collect();
        let img = rasterizer().render(&freqs, &res).unwrap();
        assert!(img.as_raw().iter().all(|&p| p == 0 || p == 255));
        assert!(img.lit_count() > 100);
    }

    #[test]
    fn points_outside_limits_are_not_drawn() {
        let img = rasterizer().render(&[500e12, 280e12], &[0.0, 900e9]).unwrap();
        assert_eq!(img.lit_count(), 0);
    }

    #[test]
    fn only_the_red_channel_is_thresholded() {
        let cfg = RasterConfig {
            marker_rgb: (250, 0, 0),
            ..RasterConfig::default()
        };
        let img = CurveRasterizer::new(cfg).unwrap().render(&[280e12], &[0.0]).unwrap();
        assert_eq!(img.lit_count(), 0);
    }

    #[test]
    fn empty_curve_rejected() {
        assert_eq!(rasterizer().render(&[], &[]).unwrap_err(), CurveError::EmptyCurve);
    }

    #[test]
    fn crop_drift_is_reported() {
        let cfg = RasterConfig {
            image_width: 100,
            ..RasterConfig::default()
        };
        let err = CurveRasterizer::new(cfg).unwrap().render(&[280e12], &[0.0]).unwrap_err();
        assert_eq!(
            err,
            CurveError::RenderSizeMismatch {
                expected: (62, 100),
                actual: (62, 111)
            }
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let freqs: Vec<f64> = (0..2000).map(|i| 200e12 + i as f64 * 4e10).collect();
        let res: Vec<f64> = freqs.iter().map(|f| (f * 3e-14).cos() * 4e11).collect();
        let r = rasterizer();
        assert_eq!(r.render(&freqs, &res).unwrap(), r.render(&freqs, &res).unwrap());
    }

    #[test]
    fn pixel_rows_follow_image_width() {
        let img = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.shape(), (2, 3));
        let rows: Vec<&[u8]> = img.pixel_rows().collect();
        assert_eq!(rows, vec![&[1u8, 2, 3][..], &[4, 5, 6][..]]);
        assert_eq!(img.lit_count(), 6);
    }
}
