//! High-level API for Support Vector Machine operations
//!
//! The free functions cover the whole training and prediction cycle:
//! [`train`], [`predict_values`], [`predict`], [`predict_probability`],
//! [`cross_validate`], [`check_parameter`], [`save`] and [`load`]. The
//! [`SVM`] builder wraps them for the common case of training from a file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smosvm::api::SVM;
//! use smosvm::KernelType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SVM::new()
//!     .with_kernel(KernelType::Rbf)
//!     .with_c(10.0)
//!     .train_from_file("data.libsvm")?;
//!
//! let accuracy = smosvm::api::evaluate_from_file(&model, "test.libsvm")?;
//! println!("Accuracy: {:.2}%", accuracy * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{KernelType, Parameters, Problem, Result, SparseVector, SvmType};
use crate::cross_validation::{cross_validation, CrossValidationReport};
use crate::data::LibSVMDataset;
use crate::model::Model;
use crate::optimizer;
use crate::persistence;
use std::path::Path;

/// Train a model; fails if the parameters do not fit the problem
pub fn train(problem: &Problem, params: &Parameters) -> Result<Model> {
    optimizer::train(problem, params)
}

pub fn predict_values(model: &Model, x: &SparseVector) -> Vec<f64> {
    model.predict_values(x)
}

pub fn predict(model: &Model, x: &SparseVector) -> f64 {
    model.predict(x)
}

/// Label and per-class probabilities ordered like the model's labels
pub fn predict_probability(model: &Model, x: &SparseVector) -> Result<(f64, Vec<f64>)> {
    model.predict_probability(x)
}

/// Held-out prediction for every example of `problem`
pub fn cross_validate(problem: &Problem, params: &Parameters, nr_fold: usize) -> Result<Vec<f64>> {
    cross_validation(problem, params, nr_fold)
}

/// Validate `params` against `problem` without training
pub fn check_parameter(problem: &Problem, params: &Parameters) -> Result<()> {
    params.check(problem)
}

pub fn save<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    persistence::save(model, path)
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    persistence::load(path)
}

/// Fraction of examples whose prediction equals the label
///
/// For regression models this counts exact matches only; use
/// [`CrossValidationReport`] for error measures.
pub fn evaluate(model: &Model, problem: &Problem) -> f64 {
    if problem.is_empty() {
        return 0.0;
    }
    let correct = problem
        .vectors()
        .iter()
        .zip(problem.labels())
        .filter(|(x, &y)| model.predict(x) == y)
        .count();
    correct as f64 / problem.len() as f64
}

/// Evaluate accuracy on a file in the sparse text format
pub fn evaluate_from_file<P: AsRef<Path>>(model: &Model, path: P) -> Result<f64> {
    let dataset = LibSVMDataset::from_file(path)?;
    Ok(evaluate(model, dataset.problem()))
}

/// Training configuration with builder methods
///
/// Unlike [`train`], training through the builder resolves `gamma = 0` to
/// `1 / max_index` of the problem first.
#[derive(Debug, Clone, Default)]
pub struct SVM {
    params: Parameters,
}

impl SVM {
    /// C-SVC with an RBF kernel and default parameters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Parameters) -> Self {
        Self { params }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.params.svm_type = svm_type;
        self
    }

    pub fn with_kernel(mut self, kernel_type: KernelType) -> Self {
        self.params.kernel_type = kernel_type;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.params.c = c;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params.gamma = gamma;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.params.nu = nu;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.params.eps = eps;
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, cache_size: f64) -> Self {
        self.params.cache_size = cache_size;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.params.probability = probability;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    fn resolved(&self, problem: &Problem) -> Parameters {
        self.params.clone().with_default_gamma(problem)
    }

    pub fn train(&self, problem: &Problem) -> Result<Model> {
        train(problem, &self.resolved(problem))
    }

    /// Train from a file in the sparse text format
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Model> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.train(dataset.problem())
    }

    /// Cross-validate and summarize the held-out predictions
    pub fn cross_validate(&self, problem: &Problem, nr_fold: usize) -> Result<CrossValidationReport> {
        let params = self.resolved(problem);
        let target = cross_validation(problem, &params, nr_fold)?;
        CrossValidationReport::new(params.svm_type, problem.labels(), &target)
    }
}
