//! k-fold cross-validation
//!
//! Classification folds are stratified so every fold keeps roughly the
//! class proportions of the whole problem, unless leave-one-out is
//! requested. Each fold trains on the remaining examples and predicts the
//! held-out ones.

use crate::core::types::{ClassGroups, ProblemView};
use crate::core::{Parameters, Problem, Result, SVMError, SvmType};
use crate::optimizer::train_view;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Predict every example of `problem` with a model trained on the other folds
///
/// Returns one target per example in the original order. `nr_fold` larger
/// than the number of examples is reduced to leave-one-out.
pub fn cross_validation(problem: &Problem, params: &Parameters, nr_fold: usize) -> Result<Vec<f64>> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    if nr_fold < 2 {
        return Err(SVMError::InvalidParameter(
            "n-fold cross validation: n must >= 2".to_string(),
        ));
    }
    params.check(problem)?;

    let nr_fold = if nr_fold > problem.len() {
        warn!(
            "{nr_fold}-fold cross validation on {} examples, using leave-one-out",
            problem.len()
        );
        problem.len()
    } else {
        nr_fold
    };

    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let target = cross_validation_view(&problem.view(), params, nr_fold, &mut rng)?;
    info!("{nr_fold}-fold cross validation finished");
    Ok(target)
}

/// Shuffle within each class and return the permutation with fold boundaries
fn stratified_folds<R: Rng>(y: &[f64], nr_fold: usize, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let l = y.len();
    let groups = ClassGroups::from_labels(y);
    let nr_class = groups.nr_class();

    let mut index = groups.perm.clone();
    for c in 0..nr_class {
        let (start, count) = (groups.start[c], groups.count[c]);
        for i in 0..count {
            let j = i + rng.gen_range(0..count - i);
            index.swap(start + i, start + j);
        }
    }

    let fold_count: Vec<usize> = (0..nr_fold)
        .map(|i| {
            groups
                .count
                .iter()
                .map(|&count| (i + 1) * count / nr_fold - i * count / nr_fold)
                .sum()
        })
        .collect();

    let mut fold_start = vec![0; nr_fold + 1];
    for i in 1..=nr_fold {
        fold_start[i] = fold_start[i - 1] + fold_count[i - 1];
    }

    let mut perm = vec![0; l];
    let mut next = fold_start.clone();
    for c in 0..nr_class {
        let (start, count) = (groups.start[c], groups.count[c]);
        for i in 0..nr_fold {
            let begin = start + i * count / nr_fold;
            let end = start + (i + 1) * count / nr_fold;
            for &k in &index[begin..end] {
                perm[next[i]] = k;
                next[i] += 1;
            }
        }
    }
    (perm, fold_start)
}

fn shuffled_folds<R: Rng>(l: usize, nr_fold: usize, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let mut perm: Vec<usize> = (0..l).collect();
    for i in 0..l {
        let j = i + rng.gen_range(0..l - i);
        perm.swap(i, j);
    }
    let fold_start = (0..=nr_fold).map(|i| i * l / nr_fold).collect();
    (perm, fold_start)
}

pub(crate) fn cross_validation_view<R: Rng>(
    prob: &ProblemView<'_>,
    params: &Parameters,
    nr_fold: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let l = prob.len();
    let (perm, fold_start) = if params.svm_type.is_classification() && nr_fold < l {
        stratified_folds(&prob.y, nr_fold, rng)
    } else {
        shuffled_folds(l, nr_fold, rng)
    };

    let mut target = vec![0.0; l];
    for fold in 0..nr_fold {
        let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
        let sub = prob.select(perm[..begin].iter().chain(&perm[end..]).copied());
        let submodel = train_view(&sub, params, rng)?;

        let use_probability = params.probability && params.svm_type.is_classification();
        for &k in &perm[begin..end] {
            target[k] = if use_probability {
                submodel.predict_probability(prob.x[k])?.0
            } else {
                submodel.predict(prob.x[k])
            };
        }
    }
    Ok(target)
}

/// How cross-validated predictions compare with the true targets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossValidationReport {
    Classification(ClassificationReport),
    Regression(RegressionReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Labels in order of first appearance among targets and predictions
    pub labels: Vec<i32>,
    /// `confusion[predicted][expected]`, indexed like `labels`
    pub confusion: Vec<Vec<usize>>,
    pub accuracy: f64,
    /// Per-label precision; `None` when the label was never predicted
    pub precision: Vec<Option<f64>>,
    /// Per-label recall; `None` when the label never occurs
    pub recall: Vec<Option<f64>>,
    /// Positions of the examples predicted wrongly
    pub misclassified: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionReport {
    pub mean_squared_error: f64,
    pub squared_correlation: f64,
}

impl CrossValidationReport {
    /// Summarize predictions against targets for the given formulation
    pub fn new(svm_type: SvmType, targets: &[f64], predictions: &[f64]) -> Result<Self> {
        if targets.len() != predictions.len() {
            return Err(SVMError::DimensionMismatch {
                expected: targets.len(),
                actual: predictions.len(),
            });
        }
        if targets.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        Ok(if svm_type.is_regression() {
            Self::Regression(RegressionReport::new(targets, predictions))
        } else {
            Self::Classification(ClassificationReport::new(targets, predictions))
        })
    }
}

impl ClassificationReport {
    fn new(targets: &[f64], predictions: &[f64]) -> Self {
        let mut labels: Vec<i32> = Vec::new();
        for &v in targets.iter().chain(predictions) {
            let label = v as i32;
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        let position = |v: f64| labels.iter().position(|&l| l == v as i32).unwrap_or(0);

        let n = labels.len();
        let mut confusion = vec![vec![0; n]; n];
        let mut misclassified = Vec::new();
        for (k, (&expected, &predicted)) in targets.iter().zip(predictions).enumerate() {
            confusion[position(predicted)][position(expected)] += 1;
            if expected != predicted {
                misclassified.push(k);
            }
        }

        let correct = targets.len() - misclassified.len();
        let accuracy = correct as f64 / targets.len() as f64;
        let ratio = |hits: usize, total: usize| (total > 0).then(|| hits as f64 / total as f64);
        let precision = (0..n)
            .map(|c| ratio(confusion[c][c], confusion[c].iter().sum()))
            .collect();
        let recall = (0..n)
            .map(|c| ratio(confusion[c][c], confusion.iter().map(|row| row[c]).sum()))
            .collect();

        Self {
            labels,
            confusion,
            accuracy,
            precision,
            recall,
            misclassified,
        }
    }
}

impl RegressionReport {
    fn new(targets: &[f64], predictions: &[f64]) -> Self {
        let n = targets.len() as f64;
        let (mut error, mut sum_v, mut sum_y, mut sum_vv, mut sum_yy, mut sum_vy) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for (&y, &v) in targets.iter().zip(predictions) {
            error += (v - y) * (v - y);
            sum_v += v;
            sum_y += y;
            sum_vv += v * v;
            sum_yy += y * y;
            sum_vy += v * y;
        }

        let numerator = (n * sum_vy - sum_v * sum_y).powi(2);
        let denominator = (n * sum_vv - sum_v * sum_v) * (n * sum_yy - sum_y * sum_y);
        Self {
            mean_squared_error: error / n,
            squared_correlation: if denominator > 0.0 {
                numerator / denominator
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector};
    use approx::assert_relative_eq;

    #[test]
    fn test_stratified_folds_partition() {
        let y = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 2.0, 2.0, 2.0];
        let mut rng = StdRng::seed_from_u64(3);
        let (perm, fold_start) = stratified_folds(&y, 3, &mut rng);

        assert_eq!(fold_start, vec![0, 4, 8, 12]);
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..12).collect::<Vec<_>>());

        // Each fold gets two of class 1 and one of each other class
        for fold in 0..3 {
            let members = &perm[fold_start[fold]..fold_start[fold + 1]];
            let ones = members.iter().filter(|&&k| y[k] == 1.0).count();
            let twos = members.iter().filter(|&&k| y[k] == 2.0).count();
            assert_eq!(ones, 2);
            assert_eq!(twos, 1);
        }
    }

    #[test]
    fn test_shuffled_fold_boundaries() {
        let mut rng = StdRng::seed_from_u64(0);
        let (perm, fold_start) = shuffled_folds(10, 3, &mut rng);
        assert_eq!(fold_start, vec![0, 3, 6, 10]);
        let mut sorted = perm;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_fold_count_validation() {
        let mut problem = Problem::default();
        problem.push(SparseVector::from_dense(&[1.0]), 1.0);
        problem.push(SparseVector::from_dense(&[-1.0]), -1.0);
        let params = Parameters::default();
        assert!(matches!(
            cross_validation(&problem, &params, 1),
            Err(SVMError::InvalidParameter(_))
        ));
        // Clamped to leave-one-out
        assert_eq!(cross_validation(&problem, &params, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_separable_cross_validation_is_perfect() {
        let mut problem = Problem::default();
        for i in 0..10 {
            let x = 1.0 + i as f64 * 0.1;
            problem.push(SparseVector::from_dense(&[x, x]), 1.0);
            problem.push(SparseVector::from_dense(&[-x, -x]), -1.0);
        }
        let params = Parameters::default().with_kernel_type(KernelType::Linear);
        let target = cross_validation(&problem, &params, 5).unwrap();
        assert_eq!(target, problem.labels());
    }

    #[test]
    fn test_classification_report() {
        let targets = [1.0, 1.0, 2.0, 2.0, 3.0];
        let predictions = [1.0, 2.0, 2.0, 2.0, 1.0];
        let report = CrossValidationReport::new(SvmType::CSvc, &targets, &predictions).unwrap();
        let CrossValidationReport::Classification(report) = report else {
            panic!("expected a classification report");
        };

        assert_eq!(report.labels, vec![1, 2, 3]);
        assert_eq!(
            report.confusion,
            vec![vec![1, 0, 1], vec![1, 2, 0], vec![0, 0, 0]]
        );
        assert_relative_eq!(report.accuracy, 0.6);
        assert_eq!(report.misclassified, vec![1, 4]);
        assert_eq!(report.precision[0], Some(0.5));
        assert_eq!(report.precision[2], None);
        assert_eq!(report.recall[1], Some(1.0));
        assert_eq!(report.recall[2], Some(0.0));
    }

    #[test]
    fn test_regression_report() {
        let targets = [1.0, 2.0, 3.0, 4.0];
        let predictions = [2.0, 3.0, 4.0, 5.0];
        let report = CrossValidationReport::new(SvmType::EpsilonSvr, &targets, &predictions).unwrap();
        let CrossValidationReport::Regression(report) = report else {
            panic!("expected a regression report");
        };
        assert_relative_eq!(report.mean_squared_error, 1.0);
        assert_relative_eq!(report.squared_correlation, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_report_length_mismatch() {
        assert!(matches!(
            CrossValidationReport::new(SvmType::CSvc, &[1.0], &[1.0, 2.0]),
            Err(SVMError::DimensionMismatch { expected: 1, actual: 2 })
        ));
    }
}
