//! Model training
//!
//! Regression and one-class problems are solved once. Classification with
//! `k` classes trains one binary decision function per class pair and merges
//! their support vectors into a single model.

pub mod formulation;

pub use self::formulation::{train_one, DecisionFunction};

use crate::core::types::{ClassGroups, ProblemView};
use crate::core::{Parameters, Problem, Result, SVMError, SvmType};
use crate::model::Model;
use crate::probability::{binary_svc_probability, svr_probability};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Train a model after validating `params` against `problem`
pub fn train(problem: &Problem, params: &Parameters) -> Result<Model> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    params.check(problem)?;

    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let model = train_view(&problem.view(), params, &mut rng)?;
    info!(
        "trained {} model: {} classes, {} support vectors",
        params.svm_type,
        model.nr_class(),
        model.total_sv()
    );
    Ok(model)
}

/// Train on a borrowed problem without validating the parameters
pub(crate) fn train_view<R: Rng>(prob: &ProblemView<'_>, params: &Parameters, rng: &mut R) -> Result<Model> {
    if prob.len() == 0 {
        return Err(SVMError::EmptyDataset);
    }
    match params.svm_type {
        SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => train_single(prob, params, rng),
        SvmType::CSvc | SvmType::NuSvc => train_pairwise(prob, params, rng),
    }
}

fn train_single<R: Rng>(prob: &ProblemView<'_>, params: &Parameters, rng: &mut R) -> Result<Model> {
    let prob_a = if params.probability && params.svm_type.is_regression() {
        Some(vec![svr_probability(prob, params, rng)])
    } else {
        None
    };

    let f = train_one(prob, params, 0.0, 0.0);

    let mut support_vectors = Vec::new();
    let mut coef = Vec::new();
    for (&x, &a) in prob.x.iter().zip(&f.alpha) {
        if a.abs() > 0.0 {
            support_vectors.push(x.clone());
            coef.push(a);
        }
    }

    Ok(Model {
        param: params.clone(),
        nr_class: 2,
        support_vectors,
        sv_coef: vec![coef],
        rho: vec![f.rho],
        prob_a,
        prob_b: None,
        labels: None,
        n_sv: None,
    })
}

/// Per-class cost `C · weight(label)`
fn weighted_costs(params: &Parameters, labels: &[i32]) -> Vec<f64> {
    let mut costs = vec![params.c; labels.len()];
    for w in &params.weights {
        match labels.iter().position(|&l| l == w.label) {
            Some(j) => costs[j] *= w.weight,
            None => warn!("class label {} specified in weight is not found", w.label),
        }
    }
    costs
}

fn train_pairwise<R: Rng>(prob: &ProblemView<'_>, params: &Parameters, rng: &mut R) -> Result<Model> {
    let l = prob.len();
    let groups = ClassGroups::from_labels(&prob.y);
    let nr_class = groups.nr_class();
    let ClassGroups {
        labels, start, count, perm, ..
    } = &groups;
    let pairs = nr_class * (nr_class - 1) / 2;
    info!("training {pairs} pairwise classifiers over {nr_class} classes");

    // Examples reordered so each class is contiguous
    let x: Vec<_> = perm.iter().map(|&i| prob.x[i]).collect();
    let costs = weighted_costs(params, labels);

    let mut nonzero = vec![false; l];
    let mut decisions = Vec::with_capacity(pairs);
    let mut prob_a = Vec::with_capacity(pairs);
    let mut prob_b = Vec::with_capacity(pairs);

    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let (si, sj) = (start[i], start[j]);
            let (ci, cj) = (count[i], count[j]);

            let mut sub = ProblemView::with_capacity(ci + cj);
            for &xk in &x[si..si + ci] {
                sub.push(xk, 1.0);
            }
            for &xk in &x[sj..sj + cj] {
                sub.push(xk, -1.0);
            }

            if params.probability {
                let (a, b) = binary_svc_probability(&sub, params, costs[i], costs[j], rng);
                prob_a.push(a);
                prob_b.push(b);
            }

            let f = train_one(&sub, params, costs[i], costs[j]);
            for k in 0..ci {
                if f.alpha[k].abs() > 0.0 {
                    nonzero[si + k] = true;
                }
            }
            for k in 0..cj {
                if f.alpha[ci + k].abs() > 0.0 {
                    nonzero[sj + k] = true;
                }
            }
            decisions.push(f);
        }
    }

    let mut n_sv = vec![0; nr_class];
    for c in 0..nr_class {
        n_sv[c] = (start[c]..start[c] + count[c]).filter(|&k| nonzero[k]).count();
    }
    let support_vectors: Vec<_> = x
        .iter()
        .zip(&nonzero)
        .filter(|(_, nz)| **nz)
        .map(|(&xk, _)| xk.clone())
        .collect();
    let total_sv = support_vectors.len();

    let mut nz_start = vec![0; nr_class];
    for c in 1..nr_class {
        nz_start[c] = nz_start[c - 1] + n_sv[c - 1];
    }

    let mut sv_coef = vec![vec![0.0; total_sv]; nr_class - 1];
    let mut rho = Vec::with_capacity(pairs);
    let mut p = 0;
    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let (si, sj) = (start[i], start[j]);
            let (ci, cj) = (count[i], count[j]);
            let f = &decisions[p];

            let mut q = nz_start[i];
            for k in 0..ci {
                if nonzero[si + k] {
                    sv_coef[j - 1][q] = f.alpha[k];
                    q += 1;
                }
            }
            let mut q = nz_start[j];
            for k in 0..cj {
                if nonzero[sj + k] {
                    sv_coef[i][q] = f.alpha[ci + k];
                    q += 1;
                }
            }
            rho.push(f.rho);
            p += 1;
        }
    }

    Ok(Model {
        param: params.clone(),
        nr_class,
        support_vectors,
        sv_coef,
        rho,
        prob_a: params.probability.then_some(prob_a),
        prob_b: params.probability.then_some(prob_b),
        labels: Some(labels.clone()),
        n_sv: Some(n_sv),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector};

    fn blobs(centers: &[(f64, f64, f64)], per_class: usize) -> Problem {
        let mut problem = Problem::default();
        for k in 0..per_class {
            let offset = (k as f64 - per_class as f64 / 2.0) * 0.1;
            for &(cx, cy, label) in centers {
                problem.push(SparseVector::from_dense(&[cx + offset, cy - offset]), label);
            }
        }
        problem
    }

    #[test]
    fn test_rejects_empty_problem() {
        let result = train(&Problem::default(), &Parameters::default());
        assert!(matches!(result, Err(SVMError::EmptyDataset)));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let problem = blobs(&[(1.0, 1.0, 1.0), (-1.0, -1.0, -1.0)], 3);
        let result = train(&problem, &Parameters::default().with_c(0.0));
        assert!(matches!(result, Err(SVMError::InvalidParameter(m)) if m == "C <= 0"));
    }

    #[test]
    fn test_three_class_layout() {
        let problem = blobs(&[(0.0, 5.0, 3.0), (5.0, 0.0, 1.0), (-5.0, -5.0, 2.0)], 5);
        let params = Parameters::default().with_kernel_type(KernelType::Linear);
        let model = train(&problem, &params).unwrap();

        assert_eq!(model.nr_class(), 3);
        assert_eq!(model.labels(), Some(&[3, 1, 2][..]));
        assert_eq!(model.rho().len(), 3);
        assert_eq!(model.sv_coef().len(), 2);
        let n_sv = model.n_sv().unwrap();
        assert_eq!(n_sv.iter().sum::<usize>(), model.total_sv());
        assert!(n_sv.iter().all(|&n| n > 0));
        assert_eq!(model.check_layout(), Ok(()));

        for (x, &y) in problem.vectors().iter().zip(problem.labels()) {
            assert_eq!(model.predict(x), y);
        }
    }

    #[test]
    fn test_single_class_model() {
        let problem = blobs(&[(1.0, 1.0, 4.0)], 3);
        let model = train(&problem, &Parameters::default()).unwrap();

        assert_eq!(model.nr_class(), 1);
        assert!(model.rho().is_empty());
        assert!(model.sv_coef().is_empty());
        assert_eq!(model.check_layout(), Ok(()));
        assert_eq!(model.predict(&SparseVector::from_dense(&[-3.0, 0.0])), 4.0);
    }

    #[test]
    fn test_weighted_costs() {
        let params = Parameters::default().with_c(2.0).with_weight(5, 3.0).with_weight(9, 10.0);
        assert_eq!(weighted_costs(&params, &[1, 5]), vec![2.0, 6.0]);
    }

    #[test]
    fn test_regression_model_shape() {
        let mut problem = Problem::default();
        for i in 0..12 {
            let x = i as f64 / 4.0;
            problem.push(SparseVector::from_dense(&[x]), 3.0 * x - 1.0);
        }
        let params = Parameters::default()
            .with_svm_type(SvmType::EpsilonSvr)
            .with_kernel_type(KernelType::Linear)
            .with_c(10.0)
            .with_p(0.05)
            .with_probability(true);
        let model = train(&problem, &params).unwrap();

        assert_eq!(model.nr_class(), 2);
        assert!(model.labels().is_none());
        assert!(model.n_sv().is_none());
        assert_eq!(model.sv_coef().len(), 1);
        assert_eq!(model.sv_coef()[0].len(), model.total_sv());
        assert!(model.svr_probability().unwrap() >= 0.0);
        assert_eq!(model.check_layout(), Ok(()));

        let x = SparseVector::from_dense(&[1.0]);
        assert!((model.predict(&x) - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_probability_parameters_per_pair() {
        let problem = blobs(&[(2.0, 2.0, 1.0), (-2.0, -2.0, -1.0)], 10);
        let params = Parameters::default()
            .with_kernel_type(KernelType::Linear)
            .with_probability(true);
        let model = train(&problem, &params).unwrap();

        assert_eq!(model.prob_a().map(<[f64]>::len), Some(1));
        assert_eq!(model.prob_b().map(<[f64]>::len), Some(1));
        let (label, probs) = model
            .predict_probability(&SparseVector::from_dense(&[3.0, 3.0]))
            .unwrap();
        assert_eq!(label, 1.0);
        assert!(probs[0] > 0.5);
    }

    #[test]
    fn test_same_seed_same_model() {
        let problem = blobs(&[(1.0, 1.0, 1.0), (-1.0, -1.0, -1.0)], 8);
        let params = Parameters::default().with_probability(true).with_random_seed(7);
        let a = train(&problem, &params).unwrap();
        let b = train(&problem, &params).unwrap();
        assert_eq!(a, b);
    }
}
