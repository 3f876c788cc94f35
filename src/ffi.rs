//! Python FFI bindings via PyO3.
//!
//! Exposes the dataset views and the dispersion preprocessing to Python so a
//! training loop can consume the corpus directly.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from rede_core import RedeDataset, preprocess
//!
//! train = RedeDataset("data/rede", train=True, test_size=0.2, seed=7)
//! test = RedeDataset("data/rede", train=False, test_indices=train.test_indices)
//! image, params = train[0]          # image: list of rows (0/255), params: 5 floats
//! omega, delta, d1, d2 = preprocess(freqs, modes)
//! ```

#![allow(non_snake_case)]

use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::DispersionConfig;
use crate::dataset::{DatasetOptions, RedeDataset, Role};
use crate::dispersion;
use crate::error::{CurveError, DatasetError};
use crate::raster::GrayImageExt;

fn dataset_err(err: DatasetError) -> PyErr {
    match err {
        DatasetError::IndexOutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        DatasetError::NotFound(_) | DatasetError::Io(_) | DatasetError::Codec(_) => {
            PyRuntimeError::new_err(err.to_string())
        }
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn curve_err(err: CurveError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// ── RedeDataset ───────────────────────────────────────────────────────────────

/// Train or test view over a persisted REDE corpus.
///
/// Args:
///     root:         directory holding ``processed/full.bin``
///     train:        True for the training split, False for the test split
///     test_size:    share of the corpus held out for testing
///     test_indices: test indices of the paired train view (required when train=False)
///     seed:         shuffle seed; drawn at random when omitted
///     transform:    callable applied to every image (a list of rows)
#[pyclass(name = "RedeDataset")]
pub struct PyRedeDataset {
    inner: RedeDataset,
    transform: Option<PyObject>,
}

#[pymethods]
impl PyRedeDataset {
    /// Open a dataset view.
    #[new]
    #[pyo3(signature = (root, train=true, test_size=0.2, test_indices=None, seed=None, transform=None))]
    pub fn new(
        root: String,
        train: bool,
        test_size: f64,
        test_indices: Option<Vec<usize>>,
        seed: Option<u64>,
        transform: Option<PyObject>,
    ) -> PyResult<Self> {
        let options = DatasetOptions {
            role: if train { Role::Train } else { Role::Test },
            test_fraction: test_size,
            test_indices,
            seed,
            transform: None,
        };
        let inner = RedeDataset::open(root, options).map_err(dataset_err)?;
        Ok(Self { inner, transform })
    }

    /// Number of items in this split.
    pub fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Return ``(image, parameters)``; negative indices raise IndexError.
    pub fn __getitem__(&self, py: Python<'_>, index: i64) -> PyResult<(PyObject, Vec<f32>)> {
        let sample = self.inner.get_signed(index).map_err(dataset_err)?;
        let rows: Vec<Vec<u8>> = sample.image.pixel_rows().map(<[u8]>::to_vec).collect();
        let image = match &self.transform {
            Some(transform) => transform.call1(py, (rows,))?,
            None => rows.into_py(py),
        };
        Ok((image, sample.parameters))
    }

    /// Test indices of this view's partition; pass them to the test view.
    #[getter]
    pub fn test_indices(&self) -> Vec<usize> {
        self.inner.test_indices().to_vec()
    }

    /// Shuffle seed the partition was drawn with.
    #[getter]
    pub fn seed(&self) -> u64 {
        self.inner.seed()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

// ── Preprocessing ─────────────────────────────────────────────────────────────

/// Resample and compute dispersion with the corpus constants.
///
/// Returns:
///     (omega, delta_omega, d1, d2) as lists of floats, in Hz
#[pyfunction]
pub fn preprocess(
    freqs: Vec<f64>,
    modes: Vec<f64>,
) -> PyResult<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> {
    let curve = dispersion::from_samples(&modes, &freqs, &DispersionConfig::default())
        .map_err(curve_err)?;
    Ok((
        curve.frequency,
        curve.residual,
        curve.first_derivative,
        curve.second_derivative,
    ))
}

// ── Module entry point ────────────────────────────────────────────────────────

/// REDE dataset bindings.
#[pymodule]
pub fn rede_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRedeDataset>()?;
    m.add_function(wrap_pyfunction!(preprocess, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("ALGORITHM_VERSION", dispersion::ALGORITHM_VERSION)?;
    Ok(())
}
