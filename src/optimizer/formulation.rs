//! Dual problem construction for the five SVM formulations
//!
//! Each formulation builds its Q matrix, linear term and feasible starting
//! point, runs the solver, and maps the solution back to one signed
//! coefficient per training example.

use crate::core::types::ProblemView;
use crate::core::{Parameters, SvmType};
use crate::kernel;
use crate::solver::{solve, QMatrix, SolutionInfo, SolverConfig, WorkingSetStrategy};
use log::debug;

/// Coefficients and offset of one binary decision function
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFunction {
    /// Signed coefficient `y_i α_i` per training example
    pub alpha: Vec<f64>,
    pub rho: f64,
}

fn signs(prob: &ProblemView<'_>) -> Vec<i8> {
    prob.y.iter().map(|&y| if y > 0.0 { 1 } else { -1 }).collect()
}

fn config(params: &Parameters, cp: f64, cn: f64, strategy: WorkingSetStrategy) -> SolverConfig {
    SolverConfig {
        cp,
        cn,
        eps: params.eps,
        shrinking: params.shrinking,
        strategy,
    }
}

fn solve_c_svc(prob: &ProblemView<'_>, params: &Parameters, cp: f64, cn: f64) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let y = signs(prob);
    let mut q = QMatrix::classification(
        prob.x.clone(),
        &y,
        kernel::from_parameters(params),
        params.cache_size,
    );
    let (mut alpha, info) = solve(
        &mut q,
        &vec![-1.0; l],
        &y,
        &vec![0.0; l],
        config(params, cp, cn, WorkingSetStrategy::Standard),
    );

    if cp == cn {
        let sum_alpha: f64 = alpha.iter().sum();
        debug!("nu = {}", sum_alpha / (cp * l as f64));
    }

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(yi);
    }
    (alpha, info)
}

fn solve_nu_svc(prob: &ProblemView<'_>, params: &Parameters) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let y = signs(prob);

    let mut sum_pos = params.nu * l as f64 / 2.0;
    let mut sum_neg = sum_pos;
    let start: Vec<f64> = y
        .iter()
        .map(|&yi| {
            let sum = if yi == 1 { &mut sum_pos } else { &mut sum_neg };
            let a = sum.min(1.0);
            *sum -= a;
            a
        })
        .collect();

    let mut q = QMatrix::classification(
        prob.x.clone(),
        &y,
        kernel::from_parameters(params),
        params.cache_size,
    );
    let (mut alpha, mut info) = solve(
        &mut q,
        &vec![0.0; l],
        &y,
        &start,
        config(params, 1.0, 1.0, WorkingSetStrategy::Nu),
    );

    let r = info.r;
    debug!("C = {}", 1.0 / r);
    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(yi) / r;
    }
    info.rho /= r;
    info.obj /= r * r;
    info.upper_bound_p = 1.0 / r;
    info.upper_bound_n = 1.0 / r;
    (alpha, info)
}

fn solve_one_class(prob: &ProblemView<'_>, params: &Parameters) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let total = params.nu * l as f64;
    let n = total as usize;

    let mut start = vec![0.0; l];
    for a in start.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        start[n] = total - n as f64;
    }

    let mut q = QMatrix::one_class(prob.x.clone(), kernel::from_parameters(params), params.cache_size);
    solve(
        &mut q,
        &vec![0.0; l],
        &vec![1; l],
        &start,
        config(params, 1.0, 1.0, WorkingSetStrategy::Standard),
    )
}

/// Fold the doubled regression solution back to `α_i - α*_i`
fn fold_regression(alpha2: &[f64], l: usize) -> Vec<f64> {
    (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect()
}

fn doubled_signs(l: usize) -> Vec<i8> {
    let mut y = vec![1i8; l];
    y.extend(std::iter::repeat(-1i8).take(l));
    y
}

fn solve_epsilon_svr(prob: &ProblemView<'_>, params: &Parameters) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let mut linear_term: Vec<f64> = prob.y.iter().map(|&y| params.p - y).collect();
    linear_term.extend(prob.y.iter().map(|&y| params.p + y));

    let mut q = QMatrix::regression(prob.x.clone(), kernel::from_parameters(params), params.cache_size);
    let (alpha2, info) = solve(
        &mut q,
        &linear_term,
        &doubled_signs(l),
        &vec![0.0; 2 * l],
        config(params, params.c, params.c, WorkingSetStrategy::Standard),
    );

    let alpha = fold_regression(&alpha2, l);
    let sum_alpha: f64 = alpha.iter().map(|a| a.abs()).sum();
    debug!("nu = {}", sum_alpha / (params.c * l as f64));
    (alpha, info)
}

fn solve_nu_svr(prob: &ProblemView<'_>, params: &Parameters) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let c = params.c;

    let mut start = vec![0.0; 2 * l];
    let mut sum = c * params.nu * l as f64 / 2.0;
    for i in 0..l {
        let a = sum.min(c);
        start[i] = a;
        start[i + l] = a;
        sum -= a;
    }

    let mut linear_term: Vec<f64> = prob.y.iter().map(|&y| -y).collect();
    linear_term.extend(prob.y.iter().copied());

    let mut q = QMatrix::regression(prob.x.clone(), kernel::from_parameters(params), params.cache_size);
    let (alpha2, info) = solve(
        &mut q,
        &linear_term,
        &doubled_signs(l),
        &start,
        config(params, c, c, WorkingSetStrategy::Nu),
    );

    debug!("epsilon = {}", -info.r);
    (fold_regression(&alpha2, l), info)
}

/// Train one decision function; `cp` and `cn` only matter for C-SVC
pub fn train_one(prob: &ProblemView<'_>, params: &Parameters, cp: f64, cn: f64) -> DecisionFunction {
    let (alpha, info) = match params.svm_type {
        SvmType::CSvc => solve_c_svc(prob, params, cp, cn),
        SvmType::NuSvc => solve_nu_svc(prob, params),
        SvmType::OneClass => solve_one_class(prob, params),
        SvmType::EpsilonSvr => solve_epsilon_svr(prob, params),
        SvmType::NuSvr => solve_nu_svr(prob, params),
    };

    debug!("obj = {}, rho = {}", info.obj, info.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (a, &y) in alpha.iter().zip(&prob.y) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if y > 0.0 {
                info.upper_bound_p
            } else {
                info.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    debug!("nSV = {n_sv}, nBSV = {n_bsv}");

    DecisionFunction {
        alpha,
        rho: info.rho,
    }
}
