//! # rede-core
//!
//! REDE — Reverse Engineering in Dispersion Engineering.
//!
//! Turns simulated microresonator mode families into a supervised-learning
//! corpus: each design's sparse (mode, frequency) samples become a fixed-size
//! binary image of its residual dispersion, paired with the design's parameter
//! vector as the regression target.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! RawSample ─► spline ─► dispersion ─► raster ─► Corpus ─► RedeDataset (train / test)
//!  (modes,      dense      anchor +      62×111     aligned      seeded, disjoint
//!   freqs)      grid       residual      binary     pairs        partitions
//! ```
//!
//! Every stage before [`Corpus`] is a pure function of the raw sample and the
//! [`PipelineConfig`]: running it twice yields bit-identical images.
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`config`] | [`PipelineConfig`] | Corpus-wide constants, validated up front |
//! | [`spline`] | [`CubicSpline`] | Cubic spline fit and uniform resampling |
//! | [`dispersion`] | [`DispersionCurve`] | Derivatives, two-stage anchor, residual, tail trim |
//! | [`raster`] | [`CurveRasterizer`], [`GrayImageExt`] | Scatter plot on a bitmap, crop and binarisation |
//! | [`pipeline`] | [`Pipeline`], [`RawSample`] | Per-sample processing and corpus build |
//! | [`corpus`] | [`Corpus`] | Aligned images and parameter vectors |
//! | [`dataset`] | [`RedeDataset`] | Reproducible train/test views with indexed access |
//! | `store` | `CorpusStore` | Persisted corpus (requires `serde`) |
//! | `ffi` | `RedeDataset` (Python) | PyO3 bindings (requires `python-ffi`) |
//!
//! ## Features
//!
//! - `serde` — serialisation of config and corpus types, on-disk corpus store.
//! - `parallel` — corpus build over a rayon pool; output order is unchanged.
//! - `python-ffi` — Python extension module.
//!
//! ## License
//!
//! Business Source License 1.1.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod corpus;
pub mod dataset;
pub mod dispersion;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod spline;
#[cfg(feature = "serde")]
pub mod store;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use config::{DispersionConfig, PipelineConfig, RasterConfig};
pub use corpus::{Corpus, PARAMETER_NAMES};
pub use dataset::{DatasetOptions, Partition, RedeDataset, Role, Sample};
pub use dispersion::{Anchor, DispersionCurve, ALGORITHM_VERSION};
pub use error::{BuildError, ConfigError, CurveError, DatasetError, SampleError};
pub use pipeline::{BuildPolicy, CorpusBuild, Pipeline, ProcessedSample, RawSample};
pub use raster::{CurveRasterizer, GrayImage, GrayImageExt};
pub use spline::{CubicSpline, SplineBoundary};
