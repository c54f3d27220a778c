//! Q matrices for the dual problems
//!
//! The solver sees one interface over three formulations. Classification
//! uses `Q_ij = y_i y_j K(x_i, x_j)`, one-class uses `K(x_i, x_j)` directly,
//! and regression works on `2l` virtual examples, each real example appearing
//! once with sign `+1` and once with sign `-1`.

use crate::cache::{CacheStats, KernelCache};
use crate::core::SparseVector;
use crate::kernel::{Kernel, KernelMatrix};

enum Form {
    Classification {
        y: Vec<i8>,
    },
    OneClass,
    /// Cache rows are real rows of length `l`, addressed through `index`
    Regression {
        l: usize,
        sign: Vec<i8>,
        index: Vec<usize>,
    },
}

/// Kernel-backed Q matrix with a column cache
pub struct QMatrix<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    qd: Vec<f32>,
    form: Form,
}

impl<'a> QMatrix<'a> {
    /// Q matrix of a binary classification problem with labels `y` in {+1, -1}
    pub fn classification(
        x: Vec<&'a SparseVector>,
        y: &[i8],
        function: Box<dyn Kernel + 'a>,
        cache_size_mb: f64,
    ) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(x, function);
        let qd = (0..l).map(|i| kernel.eval(i, i) as f32).collect();
        Self {
            kernel,
            cache: KernelCache::with_megabytes(l, cache_size_mb),
            qd,
            form: Form::Classification { y: y.to_vec() },
        }
    }

    pub fn one_class(x: Vec<&'a SparseVector>, function: Box<dyn Kernel + 'a>, cache_size_mb: f64) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(x, function);
        let qd = (0..l).map(|i| kernel.eval(i, i) as f32).collect();
        Self {
            kernel,
            cache: KernelCache::with_megabytes(l, cache_size_mb),
            qd,
            form: Form::OneClass,
        }
    }

    /// Q matrix of the doubled regression problem over `2 * x.len()` examples
    pub fn regression(x: Vec<&'a SparseVector>, function: Box<dyn Kernel + 'a>, cache_size_mb: f64) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(x, function);
        let diag: Vec<f32> = (0..l).map(|i| kernel.eval(i, i) as f32).collect();

        let mut qd = diag.clone();
        qd.extend_from_slice(&diag);
        let mut sign = vec![1i8; l];
        sign.extend(std::iter::repeat(-1i8).take(l));
        let index = (0..l).chain(0..l).collect();

        Self {
            kernel,
            cache: KernelCache::with_megabytes(l, cache_size_mb),
            qd,
            form: Form::Regression { l, sign, index },
        }
    }

    /// Number of (virtual) examples the solver works on
    pub fn len(&self) -> usize {
        self.qd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qd.is_empty()
    }

    /// Write `Q_i[0..len)` into `out[0..len)`
    ///
    /// Only the part of the row missing from the cache is evaluated.
    pub fn column(&mut self, i: usize, len: usize, out: &mut [f32]) {
        let Self {
            kernel,
            cache,
            form,
            ..
        } = self;

        match form {
            Form::Classification { y } => {
                let (data, start) = cache.get_data(i, len);
                for j in start..len {
                    data[j] = (f64::from(y[i] * y[j]) * kernel.eval(i, j)) as f32;
                }
                out[..len].copy_from_slice(&data[..len]);
            }
            Form::OneClass => {
                let (data, start) = cache.get_data(i, len);
                for j in start..len {
                    data[j] = kernel.eval(i, j) as f32;
                }
                out[..len].copy_from_slice(&data[..len]);
            }
            Form::Regression { l, sign, index } => {
                let real_i = index[i];
                let (data, start) = cache.get_data(real_i, *l);
                for j in start..*l {
                    data[j] = kernel.eval(real_i, j) as f32;
                }
                let si = sign[i];
                for (j, slot) in out.iter_mut().enumerate().take(len) {
                    *slot = f32::from(si * sign[j]) * data[index[j]];
                }
            }
        }
    }

    /// Diagonal `Q_ii` in the current ordering
    pub fn diagonal(&self) -> &[f32] {
        &self.qd
    }

    /// Exchange examples `i` and `j` in the solver's ordering
    pub fn swap_index(&mut self, i: usize, j: usize) {
        match &mut self.form {
            Form::Classification { y } => {
                self.cache.swap_index(i, j);
                self.kernel.swap_index(i, j);
                y.swap(i, j);
            }
            Form::OneClass => {
                self.cache.swap_index(i, j);
                self.kernel.swap_index(i, j);
            }
            Form::Regression { sign, index, .. } => {
                sign.swap(i, j);
                index.swap(i, j);
            }
        }
        self.qd.swap(i, j);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
