//! Kernel evaluation over the examples of one training run

use crate::core::SparseVector;
use crate::kernel::Kernel;

/// Kernel function bound to an ordered set of training vectors
///
/// The solver reorders examples while shrinking; [`KernelMatrix::swap_index`]
/// only exchanges the bindings (and cached squared norms), never the vectors.
pub struct KernelMatrix<'a> {
    x: Vec<&'a SparseVector>,
    x_square: Option<Vec<f64>>,
    function: Box<dyn Kernel + 'a>,
}

impl<'a> KernelMatrix<'a> {
    pub fn new(x: Vec<&'a SparseVector>, function: Box<dyn Kernel + 'a>) -> Self {
        let x_square = function
            .uses_norms()
            .then(|| x.iter().map(|v| v.norm_squared()).collect());
        Self {
            x,
            x_square,
            function,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// K(x_i, x_j) in the current ordering
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        match &self.x_square {
            Some(sq) => self
                .function
                .compute_with_norms(self.x[i], self.x[j], sq[i], sq[j]),
            None => self.function.compute(self.x[i], self.x[j]),
        }
    }

    pub fn swap_index(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        if let Some(sq) = self.x_square.as_mut() {
            sq.swap(i, j);
        }
    }
}
