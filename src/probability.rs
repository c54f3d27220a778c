//! Probability estimates
//!
//! Binary classifiers get a sigmoid `1 / (1 + exp(A·f + B))` fitted to
//! cross-validated decision values (Platt scaling with the improvements of
//! Lin, Lin and Weng). Pairwise estimates are coupled into class
//! probabilities with the second method of Wu, Lin and Weng. Regression
//! models get the scale of a Laplace noise distribution.

use crate::core::types::ProblemView;
use crate::core::{ClassWeight, Parameters};
use crate::cross_validation::cross_validation_view;
use crate::optimizer::train_view;
use log::warn;
use rand::Rng;

/// Folds used to collect out-of-sample decision values
const PROBABILITY_FOLDS: usize = 5;

/// Fit the sigmoid parameters `(A, B)` to decision values and ±1 labels
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    let l = dec_values.len();
    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = l as f64 - prior1;

    let max_iter = 100;
    let min_step = 1e-10;
    let sigma = 1e-3;
    let eps = 1e-5;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&t)
            .map(|(&f, &ti)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (1.0 + (-f_apb).exp()).ln()
                } else {
                    (ti - 1.0) * f_apb + (1.0 + f_apb.exp()).ln()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < max_iter {
        // Gradient and Hessian, with H' = H + σI
        let mut h11 = sigma;
        let mut h22 = sigma;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&f, &ti) in dec_values.iter().zip(&t) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = ti - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < eps && g2.abs() < eps {
            break;
        }

        // Newton direction -H'^-1 g
        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut step = 1.0;
        while step >= min_step {
            let new_a = a + step * d_a;
            let new_b = b + step * d_b;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < min_step {
            warn!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// Probability of the positive class for one decision value
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] ≈ P(i | i or j)` into class probabilities
///
/// Solves `min ½ pᵀQp` subject to `Σp = 1` by fixed-point iteration.
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("exceeds max_iter in multiclass probability coupling");
    }
    p
}

/// Fit `(A, B)` for one binary sub-problem from five-fold decision values
///
/// Labels of `prob` are ±1. `cp` and `cn` are the weighted costs of the
/// positive and negative class.
pub(crate) fn binary_svc_probability<R: Rng>(
    prob: &ProblemView<'_>,
    params: &Parameters,
    cp: f64,
    cn: f64,
    rng: &mut R,
) -> (f64, f64) {
    let l = prob.len();
    let mut perm: Vec<usize> = (0..l).collect();
    for i in 0..l {
        let j = i + rng.gen_range(0..l - i);
        perm.swap(i, j);
    }

    let mut dec_values = vec![0.0; l];
    for fold in 0..PROBABILITY_FOLDS {
        let begin = fold * l / PROBABILITY_FOLDS;
        let end = (fold + 1) * l / PROBABILITY_FOLDS;

        let train_part = prob.select(perm[..begin].iter().chain(&perm[end..]).copied());
        let positives = train_part.y.iter().filter(|&&y| y > 0.0).count();
        let negatives = train_part.len() - positives;

        // Degenerate training parts get a constant decision value
        let constant = if positives == 0 && negatives == 0 {
            Some(0.0)
        } else if negatives == 0 {
            Some(1.0)
        } else if positives == 0 {
            Some(-1.0)
        } else {
            None
        };
        if let Some(value) = constant {
            for &k in &perm[begin..end] {
                dec_values[k] = value;
            }
            continue;
        }

        let mut sub_params = params.clone();
        sub_params.probability = false;
        sub_params.c = 1.0;
        sub_params.weights = vec![
            ClassWeight {
                label: 1,
                weight: cp,
            },
            ClassWeight {
                label: -1,
                weight: cn,
            },
        ];

        // Sub-parameters are valid whenever the outer ones are
        let submodel = match train_view(&train_part, &sub_params, rng) {
            Ok(model) => model,
            Err(e) => {
                warn!("probability sub-model failed to train: {e}");
                continue;
            }
        };
        let first_label = submodel
            .labels()
            .and_then(|labels| labels.first().copied())
            .unwrap_or(1);
        for &k in &perm[begin..end] {
            let value = submodel.predict_values(prob.x[k])[0];
            dec_values[k] = value * f64::from(first_label);
        }
    }

    sigmoid_train(&dec_values, &prob.y)
}

/// Scale of the Laplace distribution fitted to five-fold regression residuals
pub(crate) fn svr_probability<R: Rng>(prob: &ProblemView<'_>, params: &Parameters, rng: &mut R) -> f64 {
    let mut sub_params = params.clone();
    sub_params.probability = false;

    let predictions = match cross_validation_view(prob, &sub_params, PROBABILITY_FOLDS, rng) {
        Ok(predictions) => predictions,
        Err(e) => {
            warn!("regression probability cross-validation failed: {e}");
            return 0.0;
        }
    };

    let residuals: Vec<f64> = prob
        .y
        .iter()
        .zip(&predictions)
        .map(|(y, pred)| y - pred)
        .collect();
    let l = residuals.len() as f64;
    let mut mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    if !kept.is_empty() {
        mae = kept.iter().sum::<f64>() / kept.len() as f64;
    }

    warn!(
        "probability model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma={mae}"
    );
    mae
}
