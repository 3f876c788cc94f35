/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Raw simulation samples in, aligned corpus out.
//!
//! ```text
//! RawSample ─► resample ─► dispersion ─► rasterize ─► (GrayImage, parameters)
//! ```
//!
//! Each sample is processed independently; with the `parallel` feature the
//! samples are spread over a rayon pool. Output order always equals input
//! order, so images and parameter vectors stay positionally aligned.

use num_complex::Complex64;
use tracing::{debug, info, warn};

use crate::config::{DispersionConfig, PipelineConfig};
use crate::corpus::Corpus;
use crate::dispersion::{self, DispersionCurve};
use crate::error::{BuildError, ConfigError, CurveError, SampleError};
use crate::raster::{CurveRasterizer, GrayImage, GrayImageExt};
use crate::spline::resample;

/// Column of the mode table holding the eigenfrequency.
const FREQUENCY_COLUMN: usize = 0;
/// Column of the mode table holding the abstract mode number.
const MODE_COLUMN: usize = 2;

// ─── RawSample ───────────────────────────────────────────────────────────────

/// One simulated design: its sparse mode samples and its parameter vector.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    /// Simulation sample id.
    pub id: u64,
    /// Abstract mode numbers, strictly increasing.
    pub modes: Vec<f64>,
    /// Eigenfrequency of each mode, Hz.
    pub freqs: Vec<f64>,
    /// Design parameters, carried through unchanged.
    pub parameters: Vec<f64>,
}

impl RawSample {
    /// Build from already separated arrays.
    pub fn new(id: u64, modes: Vec<f64>, freqs: Vec<f64>, parameters: Vec<f64>) -> Self {
        Self {
            id,
            modes,
            freqs,
            parameters,
        }
    }

    /// Build from a simulation mode table.
    ///
    /// Each row is one eigenmode; the real part of column 0 is its frequency
    /// and the real part of column 2 its abstract mode number.
    pub fn from_mode_table(
        id: u64,
        parameters: Vec<f64>,
        rows: &[Vec<Complex64>],
    ) -> Result<Self, SampleError> {
        let required = MODE_COLUMN.max(FREQUENCY_COLUMN) + 1;
        let mut modes = Vec::with_capacity(rows.len());
        let mut freqs = Vec::with_capacity(rows.len());
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() < required {
                return Err(SampleError {
                    sample_id: id,
                    source: CurveError::MalformedModeTable {
                        row,
                        columns: cells.len(),
                        required,
                    },
                });
            }
            freqs.push(cells[FREQUENCY_COLUMN].re);
            modes.push(cells[MODE_COLUMN].re);
        }
        Ok(Self::new(id, modes, freqs, parameters))
    }
}

/// Result of running one [`RawSample`] through the pipeline.
#[derive(Clone, Debug)]
pub struct ProcessedSample {
    /// Sample id.
    pub id: u64,
    /// Rendered image.
    pub image: GrayImage,
    /// Parameter vector, unchanged.
    pub parameters: Vec<f64>,
    /// Intermediate dispersion curve.
    pub curve: DispersionCurve,
}

// ─── Corpus build ────────────────────────────────────────────────────────────

/// What a corpus build does with a failing sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildPolicy {
    /// Abort on the first failing sample (in input order).
    #[default]
    FailFast,
    /// Skip failing samples and report them.
    Quarantine,
}

/// Output of [`Pipeline::build_corpus`].
#[derive(Clone, Debug, Default)]
pub struct CorpusBuild {
    /// Aligned corpus of every sample that succeeded.
    pub corpus: Corpus,
    /// Sample id at each corpus position.
    pub ids: Vec<u64>,
    /// Failed samples, in input order. Always empty under [`BuildPolicy::FailFast`].
    pub quarantined: Vec<SampleError>,
}

/// Resample, compute dispersion, and rasterize with one fixed configuration.
#[derive(Clone, Debug)]
pub struct Pipeline {
    dispersion: DispersionConfig,
    rasterizer: CurveRasterizer,
}

impl Pipeline {
    /// Validate `config` and build the pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.dispersion.validate()?;
        Ok(Self {
            dispersion: config.dispersion,
            rasterizer: CurveRasterizer::new(config.raster)?,
        })
    }

    /// Dispersion constants in use.
    pub fn dispersion_config(&self) -> &DispersionConfig {
        &self.dispersion
    }

    /// Rasterizer in use.
    pub fn rasterizer(&self) -> &CurveRasterizer {
        &self.rasterizer
    }

    /// Compute the dispersion curve of one sample without rendering it.
    pub fn dispersion(&self, modes: &[f64], freqs: &[f64]) -> Result<DispersionCurve, CurveError> {
        let resampled = resample(modes, freqs, self.dispersion.grid_size, self.dispersion.boundary)?;
        dispersion::compute(&resampled, &self.dispersion)
    }

    /// Run one sample through the whole pipeline.
    pub fn process(&self, sample: &RawSample) -> Result<ProcessedSample, SampleError> {
        let tag = |source| SampleError {
            sample_id: sample.id,
            source,
        };
        let curve = self.dispersion(&sample.modes, &sample.freqs).map_err(tag)?;
        let image = self.rasterizer.render_curve(&curve).map_err(tag)?;
        debug!(
            sample_id = sample.id,
            anchor_mode = curve.anchor.integer_mode,
            trimmed = curve.trimmed,
            lit = image.lit_count(),
            "sample processed"
        );
        Ok(ProcessedSample {
            id: sample.id,
            image,
            parameters: sample.parameters.clone(),
            curve,
        })
    }

    #[cfg(feature = "parallel")]
    fn process_all(&self, samples: &[RawSample]) -> Vec<Result<ProcessedSample, SampleError>> {
        use rayon::prelude::*;
        samples.par_iter().map(|s| self.process(s)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn process_all(&self, samples: &[RawSample]) -> Vec<Result<ProcessedSample, SampleError>> {
        samples.iter().map(|s| self.process(s)).collect()
    }

    /// Process every sample and assemble the aligned corpus.
    ///
    /// Under [`BuildPolicy::FailFast`] the first failure in input order is
    /// returned. Under [`BuildPolicy::Quarantine`] failures are logged,
    /// collected, and left out of the corpus.
    pub fn build_corpus(
        &self,
        samples: &[RawSample],
        policy: BuildPolicy,
    ) -> Result<CorpusBuild, BuildError> {
        info!(samples = samples.len(), ?policy, "building corpus");
        let mut build = CorpusBuild::default();

        for result in self.process_all(samples) {
            match result {
                Ok(done) => {
                    build.corpus.push(done.image, done.parameters)?;
                    build.ids.push(done.id);
                }
                Err(err) if policy == BuildPolicy::Quarantine => {
                    warn!(sample_id = err.sample_id, error = %err.source, "sample quarantined");
                    build.quarantined.push(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            kept = build.corpus.len(),
            quarantined = build.quarantined.len(),
            "corpus built"
        );
        Ok(build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(id: u64, offset_hz: f64) -> RawSample {
        let modes: Vec<f64> = (100..=120).map(f64::from).collect();
        let freqs = modes
            .iter()
            .map(|m| 282e12 + offset_hz + 1e12 * (m - 110.0) + 2e9 * (m - 110.0).powi(2))
            .collect();
        RawSample::new(id, modes, freqs, vec![2.5e-7, 1e-6, 7e-7, 1.8e-5, 8e-7])
    }

    #[test]
    fn mode_table_reads_real_parts_of_columns_zero_and_two() {
        let rows = vec![
            vec![Complex64::new(1.0, 9.0), Complex64::new(0.0, 0.0), Complex64::new(10.0, 3.0)],
            vec![Complex64::new(2.0, 9.0), Complex64::new(0.0, 0.0), Complex64::new(11.0, 3.0)],
        ];
        let s = RawSample::from_mode_table(7, vec![1.0], &rows).unwrap();
        assert_eq!(s.freqs, vec![1.0, 2.0]);
        assert_eq!(s.modes, vec![10.0, 11.0]);
    }

    #[test]
    fn short_mode_table_row_names_the_sample() {
        let rows = vec![vec![Complex64::new(1.0, 0.0)]];
        let err = RawSample::from_mode_table(9, vec![], &rows).unwrap_err();
        assert_eq!(err.sample_id, 9);
        assert!(matches!(err.source, CurveError::MalformedModeTable { row: 0, columns: 1, .. }));
    }

    #[test]
    fn process_carries_parameters_through() {
        let p = Pipeline::new(PipelineConfig::default()).unwrap();
        let s = family(1, 0.0);
        let out = p.process(&s).unwrap();
        assert_eq!(out.parameters, s.parameters);
        assert_eq!(out.image.shape(), (62, 111));
        assert!(out.image.lit_count() > 0);
    }

    #[test]
    fn fail_fast_reports_first_bad_sample() {
        let p = Pipeline::new(PipelineConfig::default()).unwrap();
        let samples = vec![family(1, 0.0), family(2, 50e12), family(3, 60e12)];
        match p.build_corpus(&samples, BuildPolicy::FailFast) {
            Err(BuildError::Sample(err)) => {
                assert_eq!(err.sample_id, 2);
                assert!(matches!(err.source, CurveError::NoAnchorCandidate { .. }));
            }
            other => panic!("expected sample error, got {other:?}"),
        }
    }

    #[test]
    fn quarantine_keeps_alignment() {
        let p = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut bad = family(2, 0.0);
        bad.modes.swap(3, 4);
        let samples = vec![family(1, 0.0), bad, family(3, 1e11)];
        let build = p.build_corpus(&samples, BuildPolicy::Quarantine).unwrap();
        assert_eq!(build.corpus.len(), 2);
        assert_eq!(build.ids, vec![1, 3]);
        assert_eq!(build.quarantined.len(), 1);
        assert_eq!(build.quarantined[0].sample_id, 2);
        assert!(matches!(
            build.quarantined[0].source,
            CurveError::NonMonotonicInput { position: 4 }
        ));
    }
}
