//! SVM solver implementations
//!
//! A decomposition method for the SVM dual in the style of SMO, with
//! second-order working-set selection and the shrinking heuristic of
//! "Making Large-Scale SVM Learning Practical" (Joachims).

pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::qmatrix::QMatrix;
pub use self::smo::{solve, SMOSolver, SolutionInfo, SolverConfig, WorkingSetStrategy};
