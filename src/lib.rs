//! SMO-based Support Vector Machines in the style of libsvm
//!
//! Five formulations are supported: C-SVC and ν-SVC classification with
//! pairwise multiclass, one-class distribution estimation, and ε-SVR and
//! ν-SVR regression. Models can produce Platt-calibrated probabilities and
//! are stored in the libsvm text model format.
//!
//! ```rust
//! use smosvm::{api, KernelType, Parameters, Problem, SparseVector};
//!
//! let mut problem = Problem::default();
//! problem.push(SparseVector::from_dense(&[1.0, 1.0]), 1.0);
//! problem.push(SparseVector::from_dense(&[-1.0, -1.0]), -1.0);
//!
//! let params = Parameters::new().with_kernel_type(KernelType::Linear);
//! let model = api::train(&problem, &params).unwrap();
//! assert_eq!(api::predict(&model, &SparseVector::from_dense(&[2.0, 2.0])), 1.0);
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod cross_validation;
pub mod data;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod persistence;
pub mod probability;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::SVM;
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::{
    ClassWeight, KernelType, ParsedOptions, Parameters, Problem, Result, SVMError, Sample,
    SparseVector, SvmType,
};
pub use crate::cross_validation::{
    cross_validation, ClassificationReport, CrossValidationReport, RegressionReport,
};
pub use crate::data::LibSVMDataset;
pub use crate::kernel::{Kernel, LinearKernel};
pub use crate::model::{Model, ModelSummary};
pub use crate::optimizer::train;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
