//! The processed corpus: positionally aligned images and parameter vectors.
//!
//! A [`Corpus`] is built once by [`crate::pipeline`] and afterwards only read.
//! Position `i` of `images` and of `parameters` always describe the same design.

use crate::error::DatasetError;
use crate::raster::{GrayImage, GrayImageExt};

/// Names of the REDE design parameters, in storage order.
pub const PARAMETER_NAMES: [&str; 5] = ["gap", "width1", "height", "radius1", "width2"];

/// Aligned `(image, parameter vector)` pairs with uniform shapes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Corpus {
    images: Vec<GrayImage>,
    parameters: Vec<Vec<f64>>,
}

impl Corpus {
    /// Empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel vectors, checking alignment and uniform shapes.
    pub fn from_parts(images: Vec<GrayImage>, parameters: Vec<Vec<f64>>) -> Result<Self, DatasetError> {
        if images.len() != parameters.len() {
            return Err(DatasetError::CorpusShape {
                position: images.len().min(parameters.len()),
                reason: format!(
                    "{} images but {} parameter vectors",
                    images.len(),
                    parameters.len()
                ),
            });
        }
        let mut corpus = Self::new();
        for (image, params) in images.into_iter().zip(parameters) {
            corpus.push(image, params)?;
        }
        Ok(corpus)
    }

    /// Append one sample. Its image size and parameter count must match the first sample's.
    pub fn push(&mut self, image: GrayImage, parameters: Vec<f64>) -> Result<(), DatasetError> {
        let position = self.images.len();
        if let (Some(first_image), Some(first_params)) = (self.images.first(), self.parameters.first()) {
            if image.shape() != first_image.shape() {
                return Err(DatasetError::CorpusShape {
                    position,
                    reason: format!(
                        "image is {:?}, corpus images are {:?}",
                        image.shape(),
                        first_image.shape()
                    ),
                });
            }
            if parameters.len() != first_params.len() {
                return Err(DatasetError::CorpusShape {
                    position,
                    reason: format!(
                        "{} parameters, corpus vectors have {}",
                        parameters.len(),
                        first_params.len()
                    ),
                });
            }
        }
        self.images.push(image);
        self.parameters.push(parameters);
        Ok(())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// `true` when the corpus holds no samples.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// `(height, width)` shared by every image, `None` when empty.
    pub fn image_dims(&self) -> Option<(usize, usize)> {
        self.images.first().map(GrayImage::shape)
    }

    /// Length shared by every parameter vector, `None` when empty.
    pub fn parameter_dim(&self) -> Option<usize> {
        self.parameters.first().map(Vec::len)
    }

    /// Sample at `index`.
    pub fn get(&self, index: usize) -> Option<(&GrayImage, &[f64])> {
        Some((self.images.get(index)?, self.parameters.get(index)?.as_slice()))
    }

    /// All images in corpus order.
    pub fn images(&self) -> &[GrayImage] {
        &self.images
    }

    /// All parameter vectors in corpus order.
    pub fn parameters(&self) -> &[Vec<f64>] {
        &self.parameters
    }
}
