//! Trained SVM models and prediction

use crate::core::{KernelType, Parameters, Result, SVMError, SparseVector, SvmType};
use crate::kernel;
use crate::probability::{multiclass_probability, sigmoid_predict};
use serde::Serialize;

/// Smallest pairwise probability used for coupling
const MIN_PROB: f64 = 1e-7;

/// A trained model for any of the five formulations
///
/// Classification models with `k` classes hold `k(k-1)/2` pairwise decision
/// functions over one shared list of support vectors, grouped by class.
/// `sv_coef[j - 1]` holds the coefficients of class `i`'s vectors in the
/// classifier `(i, j)`, `sv_coef[i]` those of class `j`'s vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) param: Parameters,
    pub(crate) nr_class: usize,
    pub(crate) support_vectors: Vec<SparseVector>,
    pub(crate) sv_coef: Vec<Vec<f64>>,
    pub(crate) rho: Vec<f64>,
    pub(crate) prob_a: Option<Vec<f64>>,
    pub(crate) prob_b: Option<Vec<f64>>,
    /// Class labels, classification only
    pub(crate) labels: Option<Vec<i32>>,
    /// Support vectors per class, classification only
    pub(crate) n_sv: Option<Vec<usize>>,
}

/// Serializable overview of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    pub nr_class: usize,
    pub total_sv: usize,
    pub labels: Option<Vec<i32>>,
    pub n_sv: Option<Vec<usize>>,
    pub rho: Vec<f64>,
    pub probability: bool,
}

impl Model {
    pub fn svm_type(&self) -> SvmType {
        self.param.svm_type
    }

    /// Kernel and formulation settings the model was trained with
    pub fn params(&self) -> &Parameters {
        &self.param
    }

    /// Number of classes; 2 for regression and one-class models
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in training order of first appearance
    pub fn labels(&self) -> Option<&[i32]> {
        self.labels.as_deref()
    }

    /// The number of support vectors of each class
    pub fn n_sv(&self) -> Option<&[usize]> {
        self.n_sv.as_deref()
    }

    pub fn total_sv(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.support_vectors
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    pub fn prob_a(&self) -> Option<&[f64]> {
        self.prob_a.as_deref()
    }

    pub fn prob_b(&self) -> Option<&[f64]> {
        self.prob_b.as_deref()
    }

    /// Whether the model can answer probability queries
    pub fn check_probability_model(&self) -> bool {
        match self.param.svm_type {
            SvmType::CSvc | SvmType::NuSvc => self.prob_a.is_some() && self.prob_b.is_some(),
            SvmType::EpsilonSvr | SvmType::NuSvr => self.prob_a.is_some(),
            SvmType::OneClass => false,
        }
    }

    /// Scale σ of the Laplace noise model `e^(-|z|/σ) / 2σ` of a regression model
    pub fn svr_probability(&self) -> Option<f64> {
        if self.param.svm_type.is_regression() {
            self.prob_a.as_ref().and_then(|a| a.first().copied())
        } else {
            None
        }
    }

    /// Decision values of `x`
    ///
    /// Regression and one-class models yield one value. Classification
    /// models yield one value per class pair `(i, j)`, `i < j`, in row-major
    /// order; a positive value votes for class `i`.
    pub fn predict_values(&self, x: &SparseVector) -> Vec<f64> {
        let function = kernel::from_parameters(&self.param);

        if !self.param.svm_type.is_classification() {
            let coef = self.sv_coef.first().map(Vec::as_slice).unwrap_or(&[]);
            let sum: f64 = coef
                .iter()
                .zip(&self.support_vectors)
                .map(|(c, sv)| c * function.compute(x, sv))
                .sum();
            return vec![sum - self.rho.first().copied().unwrap_or(0.0)];
        }

        let kvalue: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|sv| function.compute(x, sv))
            .collect();

        let counts = self.class_counts();
        let starts: Vec<usize> = counts
            .iter()
            .scan(0, |next, &count| {
                let start = *next;
                *next += count;
                Some(start)
            })
            .collect();

        let mut dec_values = Vec::with_capacity(self.rho.len());
        for (i, (&si, &ci)) in starts.iter().zip(counts).enumerate() {
            for (j, (&sj, &cj)) in starts.iter().zip(counts).enumerate().skip(i + 1) {
                let class_i = si..si + ci;
                let class_j = sj..sj + cj;
                let sum = self.sv_coef[j - 1][class_i.clone()]
                    .iter()
                    .zip(&kvalue[class_i])
                    .chain(self.sv_coef[i][class_j.clone()].iter().zip(&kvalue[class_j]))
                    .fold(0.0, |sum, (c, k)| sum + c * k);
                dec_values.push(sum - self.rho[dec_values.len()]);
            }
        }
        dec_values
    }

    /// Predicted label, regression target, or ±1 for one-class models
    pub fn predict(&self, x: &SparseVector) -> f64 {
        let dec_values = self.predict_values(x);

        match self.param.svm_type {
            SvmType::OneClass => {
                if dec_values[0] > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            SvmType::EpsilonSvr | SvmType::NuSvr => dec_values[0],
            SvmType::CSvc | SvmType::NuSvc => {
                let mut votes = vec![0usize; self.nr_class];
                let mut pos = 0;
                for i in 0..self.nr_class {
                    for j in i + 1..self.nr_class {
                        if dec_values[pos] > 0.0 {
                            votes[i] += 1;
                        } else {
                            votes[j] += 1;
                        }
                        pos += 1;
                    }
                }
                self.label_at(first_max(&votes))
            }
        }
    }

    /// Predicted label with per-class probabilities ordered like [`Model::labels`]
    ///
    /// Fails for models trained without probability estimates.
    pub fn predict_probability(&self, x: &SparseVector) -> Result<(f64, Vec<f64>)> {
        if !self.param.svm_type.is_classification() {
            return Err(SVMError::UnsupportedConfiguration(
                "probability estimates are only available for classification models".to_string(),
            ));
        }
        let (prob_a, prob_b) = match (&self.prob_a, &self.prob_b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(SVMError::UnsupportedConfiguration(
                    "model does not contain probability information".to_string(),
                ))
            }
        };

        let k = self.nr_class;
        let dec_values = self.predict_values(x);
        let mut pairwise = vec![vec![0.0; k]; k];
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let prob = sigmoid_predict(dec_values[p], prob_a[p], prob_b[p])
                    .max(MIN_PROB)
                    .min(1.0 - MIN_PROB);
                pairwise[i][j] = prob;
                pairwise[j][i] = 1.0 - prob;
                p += 1;
            }
        }

        let estimates = multiclass_probability(&pairwise);
        let best = estimates
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > estimates[best] { i } else { best });
        Ok((self.label_at(best), estimates))
    }

    /// Primal weight vector `w` of a linear binary model, indexed by attribute
    ///
    /// The decision value is `w·x - rho[0]`.
    pub fn linear_weights(&self) -> Result<Vec<f64>> {
        if self.support_vectors.is_empty() {
            return Err(SVMError::ModelNotTrained);
        }
        if self.param.kernel_type != KernelType::Linear {
            return Err(SVMError::UnsupportedConfiguration(format!(
                "linear weights need a linear kernel, model uses {}",
                self.param.kernel_type
            )));
        }
        if self.nr_class != 2 {
            return Err(SVMError::UnsupportedConfiguration(format!(
                "linear weights need a binary model, model has {} classes",
                self.nr_class
            )));
        }

        let max_index = self
            .support_vectors
            .iter()
            .map(SparseVector::max_index)
            .max()
            .unwrap_or(0);
        let mut weights = vec![0.0; max_index + 1];
        for (coef, sv) in self.sv_coef[0].iter().zip(&self.support_vectors) {
            for (index, value) in sv.iter() {
                weights[index] += coef * value;
            }
        }
        Ok(weights)
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            svm_type: self.param.svm_type,
            kernel_type: self.param.kernel_type,
            nr_class: self.nr_class,
            total_sv: self.total_sv(),
            labels: self.labels.clone(),
            n_sv: self.n_sv.clone(),
            rho: self.rho.clone(),
            probability: self.check_probability_model(),
        }
    }

    /// Per-class support vector counts; empty for regression and one-class
    fn class_counts(&self) -> &[usize] {
        self.n_sv.as_deref().unwrap_or_default()
    }

    /// Label of class `class`
    ///
    /// Only called for classification models, which always carry one label
    /// per class (see [`Model::check_layout`]).
    fn label_at(&self, class: usize) -> f64 {
        let labels = self.labels.as_deref().unwrap_or_default();
        f64::from(labels[class])
    }

    /// Check that the class, coefficient and rho tables agree
    ///
    /// Every model handed out by training or loading satisfies this, so
    /// prediction can index the tables directly.
    pub(crate) fn check_layout(&self) -> std::result::Result<(), String> {
        let k = self.nr_class;
        if k == 0 {
            return Err("a model needs at least one class".to_string());
        }
        let pairs = k
            .checked_mul(k - 1)
            .map(|n| n / 2)
            .ok_or_else(|| format!("nr_class {k} is too large"))?;
        let total = self.support_vectors.len();

        if self.sv_coef.len() != k - 1 {
            return Err(format!(
                "expected {} coefficient rows, found {}",
                k - 1,
                self.sv_coef.len()
            ));
        }
        if self.sv_coef.iter().any(|row| row.len() != total) {
            return Err(format!("every coefficient row needs {total} values"));
        }
        if self.rho.len() != pairs {
            return Err(format!("rho needs {pairs} values, found {}", self.rho.len()));
        }

        if self.param.svm_type.is_classification() {
            let labels = self
                .labels
                .as_deref()
                .ok_or("classification models need labels")?;
            let counts = self
                .n_sv
                .as_deref()
                .ok_or("classification models need nr_sv")?;
            if labels.len() != k || counts.len() != k {
                return Err(format!("label and nr_sv need {k} values each"));
            }
            let sum = counts
                .iter()
                .try_fold(0usize, |acc, &c| acc.checked_add(c))
                .ok_or("nr_sv overflows")?;
            if sum != total {
                return Err(format!("nr_sv adds up to {sum}, found {total} support vectors"));
            }
            for prob in [&self.prob_a, &self.prob_b].into_iter().flatten() {
                if prob.len() != pairs {
                    return Err(format!("probability tables need {pairs} values"));
                }
            }
        } else if k != 2 {
            return Err(format!("nr_class must be 2 for {} models", self.param.svm_type));
        }
        Ok(())
    }
}

/// Index of the first maximum
fn first_max(votes: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in votes.iter().enumerate().skip(1) {
        if v > votes[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Three classes with one support vector each, in one dimension
    fn three_class_model() -> Model {
        Model {
            param: Parameters::new().with_kernel_type(KernelType::Linear),
            nr_class: 3,
            support_vectors: vec![
                SparseVector::from_dense(&[1.0]),
                SparseVector::from_dense(&[2.0]),
                SparseVector::from_dense(&[3.0]),
            ],
            sv_coef: vec![vec![1.0, -1.0, -1.0], vec![1.0, 1.0, -1.0]],
            rho: vec![0.5, 0.0, -0.5],
            prob_a: None,
            prob_b: None,
            labels: Some(vec![10, 20, 30]),
            n_sv: Some(vec![1, 1, 1]),
        }
    }

    #[test]
    fn test_pairwise_decision_values() {
        let model = three_class_model();
        let x = SparseVector::from_dense(&[1.0]);
        let values = model.predict_values(&x);

        // (0,1): coef 1·1 + (-1)·2 - 0.5; (0,2): 1·1 + (-1)·3 - 0; (1,2): 1·2 + (-1)·3 + 0.5
        assert_eq!(values.len(), 3);
        assert_relative_eq!(values[0], -1.5);
        assert_relative_eq!(values[1], -2.0);
        assert_relative_eq!(values[2], -0.5);

        // Class 30 wins votes (0,2) and (1,2)
        assert_eq!(model.predict(&x), 30.0);
    }

    #[test]
    fn test_vote_ties_go_to_first_class() {
        let mut model = three_class_model();
        // One vote each: (0,1) -> 0, (0,2) -> 2, (1,2) -> 1
        model.support_vectors = vec![SparseVector::empty(); 3];
        model.rho = vec![-1.0, 1.0, -1.0];
        assert_eq!(model.predict(&SparseVector::from_dense(&[1.0])), 10.0);
    }

    #[test]
    fn test_probability_requires_probability_model() {
        let model = three_class_model();
        assert!(!model.check_probability_model());
        assert!(matches!(
            model.predict_probability(&SparseVector::empty()),
            Err(SVMError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_probability_estimates_sum_to_one() {
        let mut model = three_class_model();
        model.prob_a = Some(vec![-2.0, -2.0, -2.0]);
        model.prob_b = Some(vec![0.0, 0.0, 0.0]);
        assert!(model.check_probability_model());

        let (label, estimates) = model.predict_probability(&SparseVector::from_dense(&[3.0])).unwrap();
        assert_eq!(estimates.len(), 3);
        assert_relative_eq!(estimates.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        let best = estimates
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(label, [10.0, 20.0, 30.0][best]);
    }

    #[test]
    fn test_linear_weights() {
        let model = Model {
            param: Parameters::new().with_kernel_type(KernelType::Linear),
            nr_class: 2,
            support_vectors: vec![
                SparseVector::new(vec![1, 3], vec![1.0, 2.0]),
                SparseVector::new(vec![2], vec![4.0]),
            ],
            sv_coef: vec![vec![0.5, -0.25]],
            rho: vec![0.1],
            prob_a: None,
            prob_b: None,
            labels: Some(vec![1, -1]),
            n_sv: Some(vec![1, 1]),
        };
        assert_eq!(model.linear_weights().unwrap(), vec![0.0, 0.5, -1.0, 1.0]);

        let x = SparseVector::new(vec![1, 2, 3], vec![1.0, 1.0, 1.0]);
        let w = model.linear_weights().unwrap();
        let direct: f64 = x.iter().map(|(i, v)| w[i] * v).sum::<f64>() - 0.1;
        assert_relative_eq!(model.predict_values(&x)[0], direct, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_weights_errors() {
        let mut model = three_class_model();
        assert!(matches!(
            model.linear_weights(),
            Err(SVMError::UnsupportedConfiguration(_))
        ));

        model.support_vectors.clear();
        assert!(matches!(model.linear_weights(), Err(SVMError::ModelNotTrained)));

        let mut rbf = three_class_model();
        rbf.param.kernel_type = KernelType::Rbf;
        assert!(matches!(
            rbf.linear_weights(),
            Err(SVMError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_regression_and_one_class_prediction() {
        let mut model = Model {
            param: Parameters::new()
                .with_svm_type(SvmType::EpsilonSvr)
                .with_kernel_type(KernelType::Linear),
            nr_class: 2,
            support_vectors: vec![SparseVector::from_dense(&[2.0])],
            sv_coef: vec![vec![1.5]],
            rho: vec![1.0],
            prob_a: Some(vec![0.3]),
            prob_b: None,
            labels: None,
            n_sv: None,
        };
        let x = SparseVector::from_dense(&[1.0]);
        assert_relative_eq!(model.predict(&x), 2.0);
        assert_eq!(model.svr_probability(), Some(0.3));
        assert!(model.check_probability_model());

        model.param.svm_type = SvmType::OneClass;
        assert_eq!(model.predict(&x), 1.0);
        assert_eq!(model.predict(&SparseVector::from_dense(&[0.1])), -1.0);
        assert_eq!(model.svr_probability(), None);
    }
}
