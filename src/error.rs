//! Error taxonomy.
//!
//! Five families, matching how a failure affects a corpus build:
//!
//! | Type | Raised by | Scope |
//! |------|-----------|-------|
//! | [`ConfigError`] | [`crate::config`] | whole run, before any sample is touched |
//! | [`CurveError`] | [`crate::spline`], [`crate::dispersion`], [`crate::raster`] | one curve |
//! | [`SampleError`] | [`crate::pipeline`] | one sample, tagged with its id |
//! | [`BuildError`] | [`crate::pipeline`] | one corpus build |
//! | [`DatasetError`] | [`crate::corpus`], [`crate::dataset`], `store` | one view or one access |
//!
//! Nothing here is retried: the core has no transient failures.

use std::path::PathBuf;

use thiserror::Error;

/// A [`crate::config::PipelineConfig`] field holds a value the pipeline cannot honour.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid configuration field '{field}': {reason}")]
pub struct ConfigError {
    /// Name of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure while turning one sparse (mode, frequency) curve into an image.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CurveError {
    /// Fewer points than a cubic spline needs.
    #[error("insufficient samples: got {got}, a cubic spline needs at least {required}")]
    InsufficientSamples {
        /// Number of points supplied.
        got: usize,
        /// Minimum number of points.
        required: usize,
    },

    /// `modes` and `freqs` differ in length.
    #[error("length mismatch: {modes} modes but {freqs} frequencies")]
    LengthMismatch {
        /// Length of the mode array.
        modes: usize,
        /// Length of the frequency array.
        freqs: usize,
    },

    /// Mode indices are not strictly increasing.
    #[error("mode indices not strictly increasing at position {position}")]
    NonMonotonicInput {
        /// First position `i` with `modes[i] <= modes[i - 1]`.
        position: usize,
    },

    /// A mode or frequency is NaN or infinite.
    #[error("non-finite input value at position {position}")]
    NonFiniteInput {
        /// Position of the offending value.
        position: usize,
    },

    /// A row of the simulation mode table has too few columns.
    #[error("mode table row {row} has {columns} columns, need at least {required}")]
    MalformedModeTable {
        /// Offending row.
        row: usize,
        /// Columns present.
        columns: usize,
        /// Columns required.
        required: usize,
    },

    /// The resampled curve never reaches the reference frequency.
    #[error("no anchor candidate: reference {reference_hz:e} Hz outside resampled range [{min_hz:e}, {max_hz:e}] Hz")]
    NoAnchorCandidate {
        /// Reference frequency searched for.
        reference_hz: f64,
        /// Lowest resampled frequency.
        min_hz: f64,
        /// Highest resampled frequency.
        max_hz: f64,
    },

    /// The first derivative at the anchor is zero or non-finite, so residuals are undefined.
    #[error("degenerate slope {slope} at anchor index {index}")]
    DegenerateAnchorSlope {
        /// Anchor index in the resampled grid.
        index: usize,
        /// First derivative there.
        slope: f64,
    },

    /// Nothing is left to draw.
    #[error("curve is empty after outlier trimming")]
    EmptyCurve,

    /// Outlier trimming removed the anchor point itself.
    #[error("outlier trim removed the anchor: anchor index {anchor}, trim boundary {trim_end}")]
    AnchorTrimmed {
        /// Anchor index in the untrimmed grid.
        anchor: usize,
        /// Last index dropped by the trim (inclusive).
        trim_end: usize,
    },

    /// Canvas and crop constants do not produce the expected image size.
    #[error("render size mismatch: expected {expected:?} (h, w), got {actual:?}")]
    RenderSizeMismatch {
        /// Configured `(height, width)`.
        expected: (usize, usize),
        /// `(height, width)` after cropping.
        actual: (usize, usize),
    },

    /// The drawing backend failed.
    #[error("render backend error: {0}")]
    Render(String),

    /// The configuration itself was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// A [`CurveError`] attributed to a sample id, for corpus-level triage.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("sample {sample_id}: {source}")]
pub struct SampleError {
    /// Id of the sample that failed.
    pub sample_id: u64,
    /// Underlying curve failure.
    #[source]
    pub source: CurveError,
}

/// Failure of a whole corpus build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A sample failed under [`crate::pipeline::BuildPolicy::FailFast`].
    #[error(transparent)]
    Sample(#[from] SampleError),
    /// Processed samples could not be assembled into an aligned corpus.
    #[error(transparent)]
    Corpus(#[from] DatasetError),
}

/// Failure while loading a corpus, building a dataset view, or reading from one.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A test view was requested without the train view's test indices.
    #[error("test view needs the test indices of its train view (expected {expected} indices)")]
    MissingTestIndices {
        /// Size the test partition must have.
        expected: usize,
    },

    /// Explicit test indices have the wrong count.
    #[error("pass test indices from the train view with the correct length ({expected}), got {got}")]
    TestIndexCountMismatch {
        /// Size the test partition must have.
        expected: usize,
        /// Number of indices supplied.
        got: usize,
    },

    /// An explicit test index points past the end of the corpus.
    #[error("test index {index} outside corpus of length {len}")]
    TestIndexOutOfCorpus {
        /// Offending index.
        index: usize,
        /// Corpus length.
        len: usize,
    },

    /// An explicit test index appears more than once.
    #[error("duplicate test index {index}")]
    DuplicateTestIndex {
        /// Offending index.
        index: usize,
    },

    /// Item access outside `0..len`.
    #[error("index {index} out of range for view of length {len}")]
    IndexOutOfRange {
        /// Requested index (may be negative when it comes from Python).
        index: i64,
        /// Length of the view.
        len: usize,
    },

    /// Test fraction outside the open interval (0, 1).
    #[error("test fraction {0} must lie in (0, 1)")]
    InvalidTestFraction(f64),

    /// The corpus holds no samples.
    #[error("corpus is empty")]
    EmptyCorpus,

    /// Images and parameter vectors disagree in shape or count.
    #[error("corpus shape violation at sample {position}: {reason}")]
    CorpusShape {
        /// Position of the offending entry.
        position: usize,
        /// What is inconsistent.
        reason: String,
    },

    /// No persisted corpus at the given root.
    #[error("dataset not found at {0}")]
    NotFound(PathBuf),

    /// Persisted corpus was produced by a different dispersion algorithm or format.
    #[error("corpus {what} version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Which version field mismatched.
        what: &'static str,
        /// Version stored on disk.
        found: u16,
        /// Version this build reads.
        expected: u16,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record could not be encoded or decoded.
    #[error("corpus codec error: {0}")]
    Codec(String),
}
