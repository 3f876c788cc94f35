//! On-disk corpus: `<root>/processed/full.bin`.
//!
//! # Layout
//!
//! One bincode record holding both arrays, so a load is a single read:
//!
//! ```text
//! format_version:    u16
//! algorithm_version: u16   (crate::dispersion::ALGORITHM_VERSION at build time)
//! len, image_height, image_width, parameter_dim: u64
//! images:     [u8;  len × image_height × image_width]   row-major
//! parameters: [f64; len × parameter_dim]
//! ```
//!
//! Corpora built with other anchor/trim rules are refused on load.
//!
//! Requires the `serde` feature.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::corpus::Corpus;
use crate::dispersion::ALGORITHM_VERSION;
use crate::error::DatasetError;
use crate::raster::GrayImage;

/// Current on-disk layout version.
pub const CORPUS_FORMAT_VERSION: u16 = 1;

const PROCESSED_DIR: &str = "processed";
const FULL_FILE: &str = "full.bin";

#[derive(serde::Serialize, serde::Deserialize)]
struct CorpusRecord {
    format_version: u16,
    algorithm_version: u16,
    len: u64,
    image_height: u64,
    image_width: u64,
    parameter_dim: u64,
    images: Vec<u8>,
    parameters: Vec<f64>,
}

impl CorpusRecord {
    fn from_corpus(corpus: &Corpus) -> Self {
        let (h, w) = corpus.image_dims().unwrap_or((0, 0));
        let p = corpus.parameter_dim().unwrap_or(0);
        Self {
            format_version: CORPUS_FORMAT_VERSION,
            algorithm_version: ALGORITHM_VERSION,
            len: corpus.len() as u64,
            image_height: h as u64,
            image_width: w as u64,
            parameter_dim: p as u64,
            images: corpus.images().iter().flat_map(|i| i.as_raw().iter().copied()).collect(),
            parameters: corpus.parameters().iter().flatten().copied().collect(),
        }
    }

    fn into_corpus(self) -> Result<Corpus, DatasetError> {
        if self.format_version != CORPUS_FORMAT_VERSION {
            return Err(DatasetError::VersionMismatch {
                what: "format",
                found: self.format_version,
                expected: CORPUS_FORMAT_VERSION,
            });
        }
        if self.algorithm_version != ALGORITHM_VERSION {
            return Err(DatasetError::VersionMismatch {
                what: "algorithm",
                found: self.algorithm_version,
                expected: ALGORITHM_VERSION,
            });
        }
        let len = header_field("len", self.len)?;
        let (h, w, p) = (
            header_field("image_height", self.image_height)?,
            header_field("image_width", self.image_width)?,
            header_field("parameter_dim", self.parameter_dim)?,
        );
        let pixel_count = len
            .checked_mul(h)
            .and_then(|n| n.checked_mul(w))
            .ok_or_else(|| overflow("pixel count", len, h, w, p))?;
        let parameter_count = len
            .checked_mul(p)
            .ok_or_else(|| overflow("parameter count", len, h, w, p))?;
        if self.images.len() != pixel_count || self.parameters.len() != parameter_count {
            return Err(DatasetError::CorpusShape {
                position: 0,
                reason: format!(
                    "record declares {len} samples of {h}x{w} images and {p} parameters, \
                     but holds {} pixels and {} parameters",
                    self.images.len(),
                    self.parameters.len()
                ),
            });
        }

        let mut corpus = Corpus::new();
        if len == 0 {
            return Ok(corpus);
        }
        if h * w == 0 || p == 0 {
            return Err(DatasetError::CorpusShape {
                position: 0,
                reason: format!("degenerate sample shape: {h}x{w} images, {p} parameters"),
            });
        }
        let (width, height) = match (u32::try_from(w), u32::try_from(h)) {
            (Ok(width), Ok(height)) => (width, height),
            _ => {
                return Err(DatasetError::CorpusShape {
                    position: 0,
                    reason: format!("image size {h}x{w} exceeds the image buffer limit"),
                })
            }
        };
        for (pixels, params) in self.images.chunks_exact(h * w).zip(self.parameters.chunks_exact(p)) {
            let image = GrayImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
                DatasetError::CorpusShape {
                    position: corpus.len(),
                    reason: "pixel buffer does not match image size".into(),
                }
            })?;
            corpus.push(image, params.to_vec())?;
        }
        Ok(corpus)
    }
}

/// Header field as a native size; values that do not fit are a corrupt header.
fn header_field(name: &str, value: u64) -> Result<usize, DatasetError> {
    usize::try_from(value).map_err(|_| DatasetError::CorpusShape {
        position: 0,
        reason: format!("header field {name} = {value} does not fit this platform"),
    })
}

fn overflow(what: &str, len: usize, h: usize, w: usize, p: usize) -> DatasetError {
    DatasetError::CorpusShape {
        position: 0,
        reason: format!("{what} overflows for {len} samples of {h}x{w} images and {p} parameters"),
    }
}

/// Persisted corpus location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the corpus file.
    pub fn full_path(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR).join(FULL_FILE)
    }

    /// `true` when a corpus file is present.
    pub fn exists(&self) -> bool {
        self.full_path().is_file()
    }

    /// Write `corpus`, replacing any previous one.
    pub fn save(&self, corpus: &Corpus) -> Result<(), DatasetError> {
        let path = self.full_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(&mut out, &CorpusRecord::from_corpus(corpus))
            .map_err(|e| DatasetError::Codec(e.to_string()))?;
        out.flush()?;
        info!(path = %path.display(), samples = corpus.len(), "corpus saved");
        Ok(())
    }

    /// Read the corpus in one operation.
    pub fn load(&self) -> Result<Corpus, DatasetError> {
        let path = self.full_path();
        if !path.is_file() {
            return Err(DatasetError::NotFound(self.root.clone()));
        }
        let reader = BufReader::new(File::open(&path)?);
        let record: CorpusRecord =
            bincode::deserialize_from(reader).map_err(|e| DatasetError::Codec(e.to_string()))?;
        let corpus = record.into_corpus()?;
        info!(path = %path.display(), samples = corpus.len(), "corpus loaded");
        Ok(corpus)
    }
}
