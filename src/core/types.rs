//! Core type definitions: sparse feature vectors and training problems

use crate::core::{Result, SVMError};

/// Sparse vector representation with strictly increasing indices
///
/// Indices follow the libsvm convention and usually start at 1. Index 0 is
/// reserved for the row id of a precomputed-kernel example.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, sorting the pairs by index
    ///
    /// # Panics
    /// Panics if the lengths differ or an index occurs twice.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);
        assert!(
            pairs.windows(2).all(|w| w[0].0 != w[1].0),
            "Indices must be unique"
        );

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build a vector from pairs that must already be strictly ascending
    pub fn try_from_pairs(pairs: Vec<(usize, f64)>) -> Result<Self> {
        if let Some(w) = pairs.windows(2).find(|w| w[0].0 >= w[1].0) {
            return Err(SVMError::InvalidDataset(format!(
                "feature indices must be strictly increasing, found {} before {}",
                w[0].0, w[1].0
            )));
        }
        let (indices, values) = pairs.into_iter().unzip();
        Ok(Self { indices, values })
    }

    /// Build a sparse vector from dense values, using 1-based indices and
    /// skipping zeros
    pub fn from_dense(values: &[f64]) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i + 1, v))
            .unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Largest index present, 0 for an empty vector
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over `(index, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Training sample with features and label
#[derive(Clone, Debug)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class label or regression target
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// A training problem: one feature vector and one label per example
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Problem {
    x: Vec<SparseVector>,
    y: Vec<f64>,
}

impl Problem {
    /// Create a problem from parallel vectors and labels
    pub fn new(x: Vec<SparseVector>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SVMError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let (x, y) = samples.into_iter().map(|s| (s.features, s.label)).unzip();
        Self { x, y }
    }

    /// Append one example
    pub fn push(&mut self, features: SparseVector, label: f64) {
        self.x.push(features);
        self.y.push(label);
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn vectors(&self) -> &[SparseVector] {
        &self.x
    }

    pub fn labels(&self) -> &[f64] {
        &self.y
    }

    pub fn vector(&self, i: usize) -> &SparseVector {
        &self.x[i]
    }

    pub fn label(&self, i: usize) -> f64 {
        self.y[i]
    }

    /// Largest feature index over all examples
    pub fn max_index(&self) -> usize {
        self.x.iter().map(SparseVector::max_index).max().unwrap_or(0)
    }

    /// Iterate over examples as owned samples
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .map(|(x, &y)| Sample::new(x.clone(), y))
    }

    pub(crate) fn view(&self) -> ProblemView<'_> {
        ProblemView {
            x: self.x.iter().collect(),
            y: self.y.clone(),
        }
    }
}

/// A borrowed problem whose vectors belong to a caller-owned [`Problem`]
///
/// Pairwise sub-problems and cross-validation folds are views over the
/// original data, so the feature vectors are never copied during training.
#[derive(Clone, Debug)]
pub(crate) struct ProblemView<'a> {
    pub(crate) x: Vec<&'a SparseVector>,
    pub(crate) y: Vec<f64>,
}

impl<'a> ProblemView<'a> {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, x: &'a SparseVector, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    pub(crate) fn len(&self) -> usize {
        self.y.len()
    }

    /// Keep the examples at the given positions, in order
    pub(crate) fn select(&self, positions: impl Iterator<Item = usize>) -> Self {
        let (x, y) = positions.map(|i| (self.x[i], self.y[i])).unzip();
        Self { x, y }
    }
}

/// Examples grouped by class label, in order of first appearance
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ClassGroups {
    pub(crate) labels: Vec<i32>,
    pub(crate) start: Vec<usize>,
    pub(crate) count: Vec<usize>,
    /// Original positions, grouped so class `c` occupies `start[c]..start[c] + count[c]`
    pub(crate) perm: Vec<usize>,
}

impl ClassGroups {
    /// Labels are truncated to integers before grouping.
    pub(crate) fn from_labels(y: &[f64]) -> Self {
        let mut labels: Vec<i32> = Vec::new();
        let mut count: Vec<usize> = Vec::new();
        let mut data_label = Vec::with_capacity(y.len());

        for &value in y {
            let this_label = value as i32;
            match labels.iter().position(|&l| l == this_label) {
                Some(j) => {
                    count[j] += 1;
                    data_label.push(j);
                }
                None => {
                    data_label.push(labels.len());
                    labels.push(this_label);
                    count.push(1);
                }
            }
        }

        let mut start = vec![0; labels.len()];
        for c in 1..labels.len() {
            start[c] = start[c - 1] + count[c - 1];
        }

        let mut next = start.clone();
        let mut perm = vec![0; y.len()];
        for (i, &c) in data_label.iter().enumerate() {
            perm[next[c]] = i;
            next[c] += 1;
        }

        Self {
            labels,
            start,
            count,
            perm,
        }
    }

    pub(crate) fn nr_class(&self) -> usize {
        self.labels.len()
    }
}
