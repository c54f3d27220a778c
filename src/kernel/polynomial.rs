//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial
//!
//! The power is taken by repeated squaring on an integer exponent, so the
//! result stays exact for small integer bases.

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone)]
pub struct PolynomialKernel {
    pub gamma: f64,
    pub coef0: f64,
    pub degree: i32,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel
    ///
    /// # Examples
    /// ```
    /// use smosvm::kernel::{Kernel, PolynomialKernel};
    /// use smosvm::SparseVector;
    ///
    /// // Quadratic kernel: (x·y + 1)²
    /// let kernel = PolynomialKernel::new(2, 1.0, 1.0);
    /// let x = SparseVector::from_dense(&[1.0, 2.0]);
    /// assert_eq!(kernel.compute(&x, &x), 36.0);
    /// ```
    pub fn new(degree: i32, gamma: f64, coef0: f64) -> Self {
        Self {
            gamma,
            coef0,
            degree,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        powi(self.gamma * dot_product_sparse(x, y) + self.coef0, self.degree)
    }
}

/// `base^times` by exponentiation by squaring; non-positive exponents give 1
pub(crate) fn powi(base: f64, times: i32) -> f64 {
    let mut tmp = base;
    let mut ret = 1.0;
    let mut t = times;

    while t > 0 {
        if t % 2 == 1 {
            ret *= tmp;
        }
        tmp *= tmp;
        t /= 2;
    }
    ret
}
