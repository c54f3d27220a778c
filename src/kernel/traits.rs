//! Kernel trait definition

use crate::core::SparseVector;

/// Kernel function trait
///
/// Implementations are pure functions of the two vectors. The training-time
/// [`KernelMatrix`](crate::kernel::KernelMatrix) may supply cached squared
/// norms through [`Kernel::compute_with_norms`] when [`Kernel::uses_norms`]
/// says they help.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Compute K(x, y) from precomputed squared norms
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// Whether squared norms should be cached for this kernel
    fn uses_norms(&self) -> bool {
        false
    }
}
