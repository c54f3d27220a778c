//! Kernel functions for SVM

pub mod linear;
pub mod matrix;
pub mod polynomial;
pub mod precomputed;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::matrix::*;
pub use self::polynomial::*;
pub use self::precomputed::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, Parameters};

/// Build the kernel function selected by the parameters
pub fn from_parameters(params: &Parameters) -> Box<dyn Kernel> {
    match params.kernel_type {
        KernelType::Linear => Box::new(LinearKernel::new()),
        KernelType::Polynomial => Box::new(PolynomialKernel::new(
            params.degree,
            params.gamma,
            params.coef0,
        )),
        KernelType::Rbf => Box::new(RBFKernel::new(params.gamma)),
        KernelType::Sigmoid => Box::new(SigmoidKernel::new(params.gamma, params.coef0)),
        KernelType::Precomputed => Box::new(PrecomputedKernel::new()),
    }
}
