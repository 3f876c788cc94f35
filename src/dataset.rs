/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Train/test views over a processed corpus.
//!
//! # Partition contract
//!
//! - `|test| = round(test_fraction × len)`, `|train| = len − |test|`.
//! - Train and test are disjoint and together cover `0..len`.
//! - The shuffle is driven by a ChaCha RNG seeded from [`DatasetOptions::seed`]
//!   or, when absent, from fresh entropy. The seed used is always exposed via
//!   [`RedeDataset::seed`], so any split can be rebuilt.
//! - A test view never invents its own partition: it must be given the test
//!   indices of its train view ([`RedeDataset::test_indices`]). Without them
//!   construction fails, so a train/test pair cannot silently overlap.
//! - A train view always draws its own shuffled partition; explicit test
//!   indices are ignored for it.
//!
//! A view is train-rooted or test-rooted for its whole life.
//!
//! ```rust,ignore
//! let train = RedeDataset::new(corpus.clone(), DatasetOptions::train().with_seed(7))?;
//! let test = RedeDataset::new(corpus, DatasetOptions::test(train.test_indices().to_vec()))?;
//! ```

use core::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashSet;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::corpus::Corpus;
use crate::error::DatasetError;
use crate::raster::GrayImage;

/// Default share of the corpus held out for testing.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Pure image → image function applied after retrieval.
pub type ImageTransform = Arc<dyn Fn(GrayImage) -> GrayImage + Send + Sync>;

// ─── Role ────────────────────────────────────────────────────────────────────

/// Which side of the partition a view serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Training split.
    Train,
    /// Held-out split.
    Test,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Train => "train",
            Role::Test => "test",
        })
    }
}

// ─── Partition ───────────────────────────────────────────────────────────────

/// Disjoint train/test index sets over `0..len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// Training indices, in view order.
    pub train: Vec<usize>,
    /// Test indices, in view order.
    pub test: Vec<usize>,
}

/// Size of the test split for a corpus of `len` samples.
pub fn test_count(len: usize, test_fraction: f64) -> usize {
    ((test_fraction * len as f64).round() as usize).min(len)
}

/// Shuffle `0..len` with `seed`; the first [`test_count`] indices form the test split.
pub fn random_partition(len: usize, test_fraction: f64, seed: u64) -> Partition {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(test_count(len, test_fraction));
    Partition { train, test: order }
}

/// Adopt explicit test indices and make the train split their complement.
fn explicit_partition(len: usize, test: Vec<usize>) -> Result<Partition, DatasetError> {
    let mut seen: HashSet<usize> = HashSet::with_capacity(test.len());
    for &index in &test {
        if index >= len {
            return Err(DatasetError::TestIndexOutOfCorpus { index, len });
        }
        if !seen.insert(index) {
            return Err(DatasetError::DuplicateTestIndex { index });
        }
    }
    let train = (0..len).filter(|i| !seen.contains(i)).collect();
    Ok(Partition { train, test })
}

// ─── DatasetOptions ──────────────────────────────────────────────────────────

/// How to build a [`RedeDataset`] view.
#[derive(Clone)]
pub struct DatasetOptions {
    /// Side of the partition to serve.
    pub role: Role,
    /// Share of the corpus held out for testing, in (0, 1).
    pub test_fraction: f64,
    /// Test indices of the paired train view. Mandatory for [`Role::Test`],
    /// ignored for [`Role::Train`].
    pub test_indices: Option<Vec<usize>>,
    /// Shuffle seed. Drawn from entropy when absent.
    pub seed: Option<u64>,
    /// Applied to every retrieved image.
    pub transform: Option<ImageTransform>,
}

impl DatasetOptions {
    /// Options for a train view with the default test fraction.
    pub fn train() -> Self {
        Self {
            role: Role::Train,
            test_fraction: DEFAULT_TEST_FRACTION,
            test_indices: None,
            seed: None,
            transform: None,
        }
    }

    /// Options for a test view adopting `test_indices` from its train view.
    pub fn test(test_indices: Vec<usize>) -> Self {
        Self {
            role: Role::Test,
            test_indices: Some(test_indices),
            ..Self::train()
        }
    }

    /// Set the test fraction.
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Fix the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Apply `transform` to every retrieved image.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(GrayImage) -> GrayImage + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self::train()
    }
}

// ─── RedeDataset ─────────────────────────────────────────────────────────────

/// One retrieved item.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Image, after the view's transform.
    pub image: GrayImage,
    /// Parameter vector as single-precision floats.
    pub parameters: Vec<f32>,
}

/// Indexed, order-preserving view over one side of a corpus partition.
#[derive(Clone)]
pub struct RedeDataset {
    corpus: Arc<Corpus>,
    role: Role,
    test_fraction: f64,
    seed: u64,
    partition: Partition,
    transform: Option<ImageTransform>,
    root: Option<PathBuf>,
}

impl RedeDataset {
    /// Build a view over `corpus`.
    ///
    /// Fails with [`DatasetError::MissingTestIndices`] for a test view without
    /// explicit indices, and with [`DatasetError::TestIndexCountMismatch`] when
    /// explicit indices do not number `round(test_fraction × len)`.
    pub fn new(corpus: Arc<Corpus>, options: DatasetOptions) -> Result<Self, DatasetError> {
        let DatasetOptions {
            role,
            test_fraction,
            test_indices,
            seed,
            transform,
        } = options;

        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DatasetError::InvalidTestFraction(test_fraction));
        }
        let len = corpus.len();
        if len == 0 {
            return Err(DatasetError::EmptyCorpus);
        }

        let seed = seed.unwrap_or_else(rand::random);
        let expected = test_count(len, test_fraction);
        let partition = match (role, test_indices) {
            (Role::Train, _) => random_partition(len, test_fraction, seed),
            (Role::Test, None) => return Err(DatasetError::MissingTestIndices { expected }),
            (Role::Test, Some(indices)) if indices.len() != expected => {
                return Err(DatasetError::TestIndexCountMismatch {
                    expected,
                    got: indices.len(),
                })
            }
            (Role::Test, Some(indices)) => explicit_partition(len, indices)?,
        };

        info!(
            %role,
            corpus = len,
            train = partition.train.len(),
            test = partition.test.len(),
            seed,
            "dataset view ready"
        );

        Ok(Self {
            corpus,
            role,
            test_fraction,
            seed,
            partition,
            transform,
            root: None,
        })
    }

    /// Build a view over the corpus persisted under `root`.
    #[cfg(feature = "serde")]
    pub fn open(root: impl Into<PathBuf>, options: DatasetOptions) -> Result<Self, DatasetError> {
        let store = crate::store::CorpusStore::new(root);
        let corpus = store.load()?;
        let mut view = Self::new(Arc::new(corpus), options)?;
        view.root = Some(store.root().to_path_buf());
        Ok(view)
    }

    /// Build a train view, then a test view adopting its test indices.
    pub fn split(
        corpus: Arc<Corpus>,
        options: DatasetOptions,
    ) -> Result<(Self, Self), DatasetError> {
        let train = Self::new(
            corpus.clone(),
            DatasetOptions {
                role: Role::Train,
                test_indices: None,
                ..options.clone()
            },
        )?;
        let test = Self::new(
            corpus,
            DatasetOptions {
                role: Role::Test,
                test_indices: Some(train.test_indices().to_vec()),
                seed: Some(train.seed),
                ..options
            },
        )?;
        Ok((train, test))
    }

    /// Number of items in this view.
    pub fn len(&self) -> usize {
        self.indices().len()
    }

    /// `true` when the view holds no items.
    pub fn is_empty(&self) -> bool {
        self.indices().is_empty()
    }

    /// Side of the partition this view serves.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Shuffle seed the partition was drawn with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Configured test fraction.
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Storage root, when the view was opened from disk.
    pub fn root(&self) -> Option<&std::path::Path> {
        self.root.as_deref()
    }

    /// Full partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Training indices into the corpus.
    pub fn train_indices(&self) -> &[usize] {
        &self.partition.train
    }

    /// Test indices into the corpus; pass these to the paired test view.
    pub fn test_indices(&self) -> &[usize] {
        &self.partition.test
    }

    /// Corpus indices served by this view, in view order.
    pub fn indices(&self) -> &[usize] {
        match self.role {
            Role::Train => &self.partition.train,
            Role::Test => &self.partition.test,
        }
    }

    /// Item `index` of this view.
    pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let len = self.len();
        let &corpus_index = self.indices().get(index).ok_or(DatasetError::IndexOutOfRange {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len,
        })?;
        let (image, parameters) = self
            .corpus
            .get(corpus_index)
            .ok_or(DatasetError::TestIndexOutOfCorpus {
                index: corpus_index,
                len: self.corpus.len(),
            })?;
        let image = match &self.transform {
            Some(transform) => transform(image.clone()),
            None => image.clone(),
        };
        Ok(Sample {
            image,
            parameters: parameters.iter().map(|&p| p as f32).collect(),
        })
    }

    /// Item access with a signed index; negative indices are out of range.
    pub fn get_signed(&self, index: i64) -> Result<Sample, DatasetError> {
        match usize::try_from(index) {
            Ok(i) => self.get(i),
            Err(_) => Err(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            }),
        }
    }

    /// Items in view order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample, DatasetError>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

impl fmt::Debug for RedeDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedeDataset")
            .field("role", &self.role)
            .field("len", &self.len())
            .field("test_fraction", &self.test_fraction)
            .field("seed", &self.seed)
            .field("root", &self.root)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl fmt::Display for RedeDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset RedeDataset")?;
        writeln!(f, "    Number of datapoints: {}", self.len())?;
        writeln!(f, "    Split: {} (test_size: {})", self.role, self.test_fraction)?;
        match &self.root {
            Some(root) => writeln!(f, "    Root Location: {}", root.display())?,
            None => writeln!(f, "    Root Location: <in memory>")?,
        }
        let transform = if self.transform.is_some() { "custom" } else { "None" };
        writeln!(f, "    Transforms (if any): {transform}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn corpus(len: usize) -> Arc<Corpus> {
        let mut c = Corpus::new();
        for i in 0..len {
            let image = GrayImage::from_pixel(2, 2, Luma([(i % 256) as u8]));
            c.push(image, vec![i as f64, 0.5]).unwrap();
        }
        Arc::new(c)
    }

    #[test]
    fn rede_sized_split() {
        let train = RedeDataset::new(corpus(1056), DatasetOptions::train().with_seed(1)).unwrap();
        assert_eq!(train.test_indices().len(), 211);
        assert_eq!(train.len(), 845);
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        for (len, f) in [(10, 0.3), (97, 0.5), (1, 0.4), (250, 0.01)] {
            let p = random_partition(len, f, 42);
            assert_eq!(p.train.len() + p.test.len(), len);
            let mut all: Vec<usize> = p.train.iter().chain(&p.test).copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn same_seed_same_partition() {
        assert_eq!(random_partition(300, 0.2, 9), random_partition(300, 0.2, 9));
        assert_ne!(random_partition(300, 0.2, 9), random_partition(300, 0.2, 10));
    }

    #[test]
    fn test_view_requires_indices() {
        let opts = DatasetOptions {
            role: Role::Test,
            ..DatasetOptions::train()
        };
        match RedeDataset::new(corpus(50), opts) {
            Err(DatasetError::MissingTestIndices { expected: 10 }) => {}
            other => panic!("expected MissingTestIndices, got {other:?}"),
        }
    }

    #[test]
    fn test_view_rejects_wrong_count() {
        match RedeDataset::new(corpus(50), DatasetOptions::test(vec![1, 2, 3])) {
            Err(DatasetError::TestIndexCountMismatch { expected: 10, got: 3 }) => {}
            other => panic!("expected TestIndexCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_view_rejects_duplicates_and_strays() {
        let dup = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 8];
        assert!(matches!(
            RedeDataset::new(corpus(50), DatasetOptions::test(dup)),
            Err(DatasetError::DuplicateTestIndex { index: 8 })
        ));
        let stray = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 50];
        assert!(matches!(
            RedeDataset::new(corpus(50), DatasetOptions::test(stray)),
            Err(DatasetError::TestIndexOutOfCorpus { index: 50, len: 50 })
        ));
    }

    #[test]
    fn test_view_serves_explicit_indices_in_order() {
        let c = corpus(20);
        let idx = vec![17, 3, 9, 0];
        let test = RedeDataset::new(c.clone(), DatasetOptions::test(idx.clone())).unwrap();
        assert_eq!(test.len(), 4);
        for (i, &ci) in idx.iter().enumerate() {
            let item = test.get(i).unwrap();
            let (img, params) = c.get(ci).unwrap();
            assert_eq!(&item.image, img);
            assert_eq!(item.parameters, params.iter().map(|&p| p as f32).collect::<Vec<_>>());
        }
        assert_eq!(test.train_indices().len(), 16);
        assert!(test.train_indices().iter().all(|i| !idx.contains(i)));
    }

    #[test]
    fn train_view_ignores_explicit_indices() {
        let c = corpus(50);
        let opts = DatasetOptions {
            test_indices: Some((0..10).collect()),
            ..DatasetOptions::train().with_seed(12)
        };
        let train = RedeDataset::new(c.clone(), opts).unwrap();
        assert_eq!(train.partition(), &random_partition(50, 0.2, 12));
        let ascending: Vec<usize> = (10..50).collect();
        assert_ne!(train.indices(), ascending.as_slice(), "train order must stay shuffled");
    }

    #[test]
    fn out_of_range_access_fails_without_side_effects() {
        let train = RedeDataset::new(corpus(10), DatasetOptions::train().with_seed(3)).unwrap();
        let len = train.len();
        assert!(matches!(
            train.get(len),
            Err(DatasetError::IndexOutOfRange { index, len: l }) if index == len as i64 && l == len
        ));
        assert!(matches!(
            train.get_signed(-1),
            Err(DatasetError::IndexOutOfRange { index: -1, .. })
        ));
        assert!(train.get(len - 1).is_ok());
    }

    #[test]
    fn invalid_fraction_rejected() {
        for f in [0.0, 1.0, -0.2, f64::NAN] {
            assert!(matches!(
                RedeDataset::new(corpus(10), DatasetOptions::train().with_test_fraction(f)),
                Err(DatasetError::InvalidTestFraction(_))
            ));
        }
    }

    #[test]
    fn transform_applies_after_retrieval() {
        let opts = DatasetOptions::train()
            .with_seed(5)
            .with_transform(|img| GrayImage::from_pixel(img.width(), img.height(), Luma([77])));
        let train = RedeDataset::new(corpus(10), opts).unwrap();
        assert_eq!(train.get(0).unwrap().image.get_pixel(1, 1).0, [77]);
    }

    #[test]
    fn display_mentions_split() {
        let train = RedeDataset::new(corpus(10), DatasetOptions::train().with_seed(5)).unwrap();
        let text = train.to_string();
        assert!(text.contains("Number of datapoints: 8"));
        assert!(text.contains("Split: train (test_size: 0.2)"));
    }
}
