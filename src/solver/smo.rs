//! Sequential Minimal Optimization solver
//!
//! Solves the dual problem
//!
//! ```text
//! min 0.5 αᵀQα + pᵀα
//!     yᵀα = δ
//!     0 ≤ α_i ≤ Cp for y_i = +1,  0 ≤ α_i ≤ Cn for y_i = -1
//! ```
//!
//! starting from a feasible α. Each iteration picks a working pair with
//! second-order information and updates it analytically. The ν variant only
//! pairs examples of the same label, since it keeps both class sums fixed.

use crate::solver::qmatrix::QMatrix;
use log::{debug, warn};

pub(crate) const INF: f64 = f64::INFINITY;

/// Floor for non-positive curvature along a working direction
pub(crate) const TAU: f64 = 1e-12;

/// How the working pair is chosen and how ρ is recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingSetStrategy {
    /// Any violating pair; C-SVC, ε-SVR and one-class
    Standard,
    /// Same-label pairs only; ν-SVC and ν-SVR
    Nu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Settings of one solver run
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub cp: f64,
    pub cn: f64,
    pub eps: f64,
    pub shrinking: bool,
    pub strategy: WorkingSetStrategy,
}

/// Result of one solver run besides α
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionInfo {
    pub obj: f64,
    pub rho: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    /// Only set by the ν strategy
    pub r: f64,
    pub iterations: usize,
}

/// Solver state over a Q matrix
///
/// Examples are reordered in place while shrinking; `active_set` maps the
/// current position of every example back to its original index.
pub struct SMOSolver<'q, 'a> {
    pub(super) q: &'q mut QMatrix<'a>,
    pub(super) l: usize,
    pub(super) active_size: usize,
    pub(super) y: Vec<i8>,
    /// Gradient of the objective
    pub(super) g: Vec<f64>,
    /// Gradient contribution of the examples at their upper bound
    pub(super) g_bar: Vec<f64>,
    pub(super) alpha: Vec<f64>,
    pub(super) alpha_status: Vec<AlphaStatus>,
    pub(super) p: Vec<f64>,
    pub(super) active_set: Vec<usize>,
    pub(super) cp: f64,
    pub(super) cn: f64,
    pub(super) eps: f64,
    pub(super) strategy: WorkingSetStrategy,
    shrinking: bool,
    pub(super) unshrunk: bool,
    pub(super) col_i: Vec<f32>,
    pub(super) col_j: Vec<f32>,
}

impl<'q, 'a> SMOSolver<'q, 'a> {
    /// Prepare a run over `q` with linear term `p`, labels `y` and initial `alpha`
    ///
    /// # Panics
    /// Panics if `p`, `y` or `alpha` do not have one entry per example of `q`.
    pub fn new(
        q: &'q mut QMatrix<'a>,
        p: &[f64],
        y: &[i8],
        alpha: &[f64],
        config: SolverConfig,
    ) -> Self {
        let l = q.len();
        assert_eq!(p.len(), l, "linear term must match the problem size");
        assert_eq!(y.len(), l, "labels must match the problem size");
        assert_eq!(alpha.len(), l, "alpha must match the problem size");

        let mut solver = Self {
            q,
            l,
            active_size: l,
            y: y.to_vec(),
            g: p.to_vec(),
            g_bar: vec![0.0; l],
            alpha: alpha.to_vec(),
            alpha_status: vec![AlphaStatus::LowerBound; l],
            p: p.to_vec(),
            active_set: (0..l).collect(),
            cp: config.cp,
            cn: config.cn,
            eps: config.eps,
            strategy: config.strategy,
            shrinking: config.shrinking,
            unshrunk: false,
            col_i: vec![0.0; l],
            col_j: vec![0.0; l],
        };

        for i in 0..l {
            solver.update_alpha_status(i);
        }
        solver.init_gradient();
        solver
    }

    fn init_gradient(&mut self) {
        let l = self.l;
        for i in 0..l {
            if self.is_lower_bound(i) {
                continue;
            }
            self.q.column(i, l, &mut self.col_i);
            let alpha_i = self.alpha[i];
            for j in 0..l {
                self.g[j] += alpha_i * f64::from(self.col_i[j]);
            }
            if self.is_upper_bound(i) {
                let c_i = self.get_c(i);
                for j in 0..l {
                    self.g_bar[j] += c_i * f64::from(self.col_i[j]);
                }
            }
        }
    }

    /// Run to convergence and return α in the original order
    pub fn solve(mut self) -> (Vec<f64>, SolutionInfo) {
        let mut iter = 0usize;
        let max_iter = 10_000_000usize.max(self.l.saturating_mul(100));
        let mut counter = self.l.min(1000) + 1;

        while iter < max_iter {
            counter -= 1;
            if counter == 0 {
                counter = self.l.min(1000);
                if self.shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    self.reconstruct_gradient();
                    self.active_size = self.l;
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => break,
                    }
                }
            };

            iter += 1;
            self.take_step(i, j);
        }

        if iter >= max_iter {
            if self.active_size < self.l {
                self.reconstruct_gradient();
                self.active_size = self.l;
            }
            warn!("reaching max number of iterations ({max_iter})");
        }

        let (rho, r) = self.calculate_rho();
        let obj = (0..self.l)
            .map(|i| self.alpha[i] * (self.g[i] + self.p[i]))
            .sum::<f64>()
            / 2.0;

        let mut alpha = vec![0.0; self.l];
        for (pos, &original) in self.active_set.iter().enumerate() {
            alpha[original] = self.alpha[pos];
        }

        let stats = self.q.cache_stats();
        debug!(
            "optimization finished, #iter = {iter}, obj = {obj}, rho = {rho}, cache hits {}/{}",
            stats.hits,
            stats.hits + stats.misses
        );

        let info = SolutionInfo {
            obj,
            rho,
            upper_bound_p: self.cp,
            upper_bound_n: self.cn,
            r,
            iterations: iter,
        };
        (alpha, info)
    }

    /// Analytic update of the pair `(i, j)`
    fn take_step(&mut self, i: usize, j: usize) {
        let n = self.active_size;
        self.q.column(i, n, &mut self.col_i);
        self.q.column(j, n, &mut self.col_j);

        let c_i = self.get_c(i);
        let c_j = self.get_c(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let mut quad_coef =
                f64::from(self.col_i[i] + self.col_j[j] + 2.0 * self.col_i[j]);
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let mut quad_coef =
                f64::from(self.col_i[i] + self.col_j[j] - 2.0 * self.col_i[j]);
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;
        for k in 0..n {
            self.g[k] += f64::from(self.col_i[k]) * delta_alpha_i
                + f64::from(self.col_j[k]) * delta_alpha_j;
        }

        let ui = self.is_upper_bound(i);
        let uj = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        let l = self.l;
        if ui != self.is_upper_bound(i) {
            self.q.column(i, l, &mut self.col_i);
            let step = if ui { -c_i } else { c_i };
            for k in 0..l {
                self.g_bar[k] += step * f64::from(self.col_i[k]);
            }
        }
        if uj != self.is_upper_bound(j) {
            self.q.column(j, l, &mut self.col_j);
            let step = if uj { -c_j } else { c_j };
            for k in 0..l {
                self.g_bar[k] += step * f64::from(self.col_j[k]);
            }
        }
    }

    /// Pick the working pair, or `None` when the active set is optimal within `eps`
    pub(super) fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.strategy {
            WorkingSetStrategy::Standard => self.select_standard(),
            WorkingSetStrategy::Nu => self.select_nu(),
        }
    }

    /// i maximizes `-y_i ∇f_i` over I_up; j minimizes the second-order
    /// objective change over I_low
    fn select_standard(&mut self) -> Option<(usize, usize)> {
        let n = self.active_size;
        let mut gmax = -INF;
        let mut gmax2 = -INF;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..n {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        if let Some(i) = gmax_idx {
            self.q.column(i, n, &mut self.col_i);
            let qd = self.q.diagonal();
            let q_ii = self.col_i[i];
            let y_i = f32::from(self.y[i]);

            for j in 0..n {
                let (grad_diff, quad_coef) = if self.y[j] == 1 {
                    if self.is_lower_bound(j) {
                        continue;
                    }
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    (gmax + self.g[j], q_ii + qd[j] - 2.0 * y_i * self.col_i[j])
                } else {
                    if self.is_upper_bound(j) {
                        continue;
                    }
                    if -self.g[j] >= gmax2 {
                        gmax2 = -self.g[j];
                    }
                    (gmax - self.g[j], q_ii + qd[j] + 2.0 * y_i * self.col_i[j])
                };

                if grad_diff > 0.0 {
                    let obj_diff = objective_decrease(grad_diff, f64::from(quad_coef));
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        Some((gmax_idx?, gmin_idx?))
    }

    /// Same-label selection, run separately for the positive and negative class
    fn select_nu(&mut self) -> Option<(usize, usize)> {
        let n = self.active_size;
        let mut gmaxp = -INF;
        let mut gmaxp2 = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn2 = -INF;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..n {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        // col_i holds Q_ip and col_j holds Q_in
        if let Some(ip) = gmaxp_idx {
            self.q.column(ip, n, &mut self.col_i);
        }
        if let Some(in_) = gmaxn_idx {
            self.q.column(in_, n, &mut self.col_j);
        }
        let qd = self.q.diagonal();

        for j in 0..n {
            let (grad_diff, quad_coef) = if self.y[j] == 1 {
                if self.is_lower_bound(j) {
                    continue;
                }
                if self.g[j] >= gmaxp2 {
                    gmaxp2 = self.g[j];
                }
                let grad_diff = gmaxp + self.g[j];
                match gmaxp_idx {
                    Some(ip) if grad_diff > 0.0 => (
                        grad_diff,
                        self.col_i[ip] + qd[j] - 2.0 * self.col_i[j],
                    ),
                    _ => continue,
                }
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                if -self.g[j] >= gmaxn2 {
                    gmaxn2 = -self.g[j];
                }
                let grad_diff = gmaxn - self.g[j];
                match gmaxn_idx {
                    Some(in_) if grad_diff > 0.0 => (
                        grad_diff,
                        self.col_j[in_] + qd[j] - 2.0 * self.col_j[j],
                    ),
                    _ => continue,
                }
            };

            let obj_diff = objective_decrease(grad_diff, f64::from(quad_coef));
            if obj_diff <= obj_diff_min {
                gmin_idx = Some(j);
                obj_diff_min = obj_diff;
            }
        }

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < self.eps {
            return None;
        }

        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    /// Returns `(rho, r)`; `r` is 0 for the standard strategy
    fn calculate_rho(&self) -> (f64, f64) {
        match self.strategy {
            WorkingSetStrategy::Standard => (self.standard_rho(), 0.0),
            WorkingSetStrategy::Nu => self.nu_rho(),
        }
    }

    fn standard_rho(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for i in 0..self.active_size {
            let y_g = f64::from(self.y[i]) * self.g[i];
            match self.alpha_status[i] {
                AlphaStatus::LowerBound => {
                    if self.y[i] > 0 {
                        ub = ub.min(y_g);
                    } else {
                        lb = lb.max(y_g);
                    }
                }
                AlphaStatus::UpperBound => {
                    if self.y[i] < 0 {
                        ub = ub.min(y_g);
                    } else {
                        lb = lb.max(y_g);
                    }
                }
                AlphaStatus::Free => {
                    nr_free += 1;
                    sum_free += y_g;
                }
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    fn nu_rho(&self) -> (f64, f64) {
        // Index 0 collects the positive class, index 1 the negative class
        let mut nr_free = [0usize; 2];
        let mut ub = [INF; 2];
        let mut lb = [-INF; 2];
        let mut sum_free = [0.0; 2];

        for i in 0..self.active_size {
            let c = usize::from(self.y[i] != 1);
            match self.alpha_status[i] {
                AlphaStatus::LowerBound => ub[c] = ub[c].min(self.g[i]),
                AlphaStatus::UpperBound => lb[c] = lb[c].max(self.g[i]),
                AlphaStatus::Free => {
                    nr_free[c] += 1;
                    sum_free[c] += self.g[i];
                }
            }
        }

        let side = |c: usize| {
            if nr_free[c] > 0 {
                sum_free[c] / nr_free[c] as f64
            } else {
                (ub[c] + lb[c]) / 2.0
            }
        };
        let r1 = side(0);
        let r2 = side(1);
        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }

    pub(super) fn get_c(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    fn update_alpha_status(&mut self, i: usize) {
        self.alpha_status[i] = if self.alpha[i] >= self.get_c(i) {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(super) fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::UpperBound
    }

    pub(super) fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::LowerBound
    }

    pub(super) fn is_free(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::Free
    }

    pub(super) fn swap_index(&mut self, i: usize, j: usize) {
        self.q.swap_index(i, j);
        self.y.swap(i, j);
        self.g.swap(i, j);
        self.alpha_status.swap(i, j);
        self.alpha.swap(i, j);
        self.p.swap(i, j);
        self.active_set.swap(i, j);
        self.g_bar.swap(i, j);
    }
}

/// Second-order estimate of the objective change along a working direction
fn objective_decrease(grad_diff: f64, quad_coef: f64) -> f64 {
    let quad_coef = if quad_coef > 0.0 { quad_coef } else { TAU };
    -(grad_diff * grad_diff) / quad_coef
}

/// Solve one dual problem and return α in the original order
pub fn solve(
    q: &mut QMatrix<'_>,
    p: &[f64],
    y: &[i8],
    alpha: &[f64],
    config: SolverConfig,
) -> (Vec<f64>, SolutionInfo) {
    SMOSolver::new(q, p, y, alpha, config).solve()
}
