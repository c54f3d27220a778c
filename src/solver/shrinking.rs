//! Shrinking and gradient reconstruction
//!
//! Bounded examples whose gradient says they will stay at their bound are
//! moved behind `active_size` and skipped by working-set selection. Their
//! gradient is left stale and rebuilt from `G_bar` when the whole problem is
//! examined again. Once the optimality gap first falls to `10·eps`, every
//! example gets a chance to return.

use crate::solver::smo::{SMOSolver, WorkingSetStrategy, INF};
use log::debug;

/// Shrinking limits per bound side and label
///
/// An example at its lower bound is shrunk when `-G < lower`, one at its
/// upper bound when `G < upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShrinkThresholds {
    pub(crate) lower_pos: f64,
    pub(crate) lower_neg: f64,
    pub(crate) upper_pos: f64,
    pub(crate) upper_neg: f64,
}

impl ShrinkThresholds {
    fn lower(&self, y: i8) -> f64 {
        if y == 1 {
            self.lower_pos
        } else {
            self.lower_neg
        }
    }

    fn upper(&self, y: i8) -> f64 {
        if y == 1 {
            self.upper_pos
        } else {
            self.upper_neg
        }
    }

    /// Largest violation of the current optimality conditions
    fn gap(&self) -> f64 {
        (-(self.lower_pos + self.upper_pos)).max(-(self.lower_neg + self.upper_neg))
    }
}

impl<'q, 'a> SMOSolver<'q, 'a> {
    /// Thresholds from the maximal violating pair; `None` means the active
    /// set is already optimal and nothing is shrunk
    fn shrink_thresholds(&self) -> Option<ShrinkThresholds> {
        match self.strategy {
            WorkingSetStrategy::Standard => {
                // gmax1 = max -y∇f over I_up, gmax2 = max y∇f over I_low
                let mut gmax1 = -INF;
                let mut gmax2 = -INF;
                for i in 0..self.active_size {
                    let (up, low) = if self.y[i] == 1 {
                        (-self.g[i], self.g[i])
                    } else {
                        (self.g[i], -self.g[i])
                    };
                    let up_side = if self.y[i] == 1 {
                        !self.is_upper_bound(i)
                    } else {
                        !self.is_lower_bound(i)
                    };
                    let low_side = if self.y[i] == 1 {
                        !self.is_lower_bound(i)
                    } else {
                        !self.is_upper_bound(i)
                    };
                    if up_side && up >= gmax1 {
                        gmax1 = up;
                    }
                    if low_side && low >= gmax2 {
                        gmax2 = low;
                    }
                }

                if gmax1 + gmax2 < self.eps {
                    return None;
                }
                let gm1 = -gmax2;
                let gm2 = -gmax1;
                Some(ShrinkThresholds {
                    lower_pos: gm1,
                    lower_neg: gm2,
                    upper_pos: gm2,
                    upper_neg: gm1,
                })
            }
            WorkingSetStrategy::Nu => {
                let mut gmax1 = -INF;
                let mut gmax2 = -INF;
                let mut gmax3 = -INF;
                let mut gmax4 = -INF;
                for k in 0..self.active_size {
                    if !self.is_upper_bound(k) {
                        if self.y[k] == 1 {
                            gmax1 = gmax1.max(-self.g[k]);
                        } else {
                            gmax3 = gmax3.max(-self.g[k]);
                        }
                    }
                    if !self.is_lower_bound(k) {
                        if self.y[k] == 1 {
                            gmax2 = gmax2.max(self.g[k]);
                        } else {
                            gmax4 = gmax4.max(self.g[k]);
                        }
                    }
                }
                Some(ShrinkThresholds {
                    lower_pos: -gmax2,
                    lower_neg: -gmax4,
                    upper_pos: -gmax1,
                    upper_neg: -gmax3,
                })
            }
        }
    }

    fn be_shrunk(&self, k: usize, t: &ShrinkThresholds) -> bool {
        if self.is_lower_bound(k) {
            -self.g[k] < t.lower(self.y[k])
        } else if self.is_upper_bound(k) {
            self.g[k] < t.upper(self.y[k])
        } else {
            false
        }
    }

    pub(super) fn do_shrinking(&mut self) {
        let Some(thresholds) = self.shrink_thresholds() else {
            return;
        };

        let before = self.active_size;
        let mut k = 0;
        while k < self.active_size {
            if self.be_shrunk(k, &thresholds) {
                self.active_size -= 1;
                self.swap_index(k, self.active_size);
            } else {
                k += 1;
            }
        }
        if self.active_size < before {
            debug!("shrinking: active set {} -> {}", before, self.active_size);
        }

        if self.unshrunk || thresholds.gap() > self.eps * 10.0 {
            return;
        }

        self.unshrunk = true;
        self.reconstruct_gradient();

        let before = self.active_size;
        let mut k = self.l;
        while k > self.active_size {
            let idx = k - 1;
            if !self.is_free(idx) && !self.be_shrunk(idx, &thresholds) {
                self.swap_index(idx, self.active_size);
                self.active_size += 1;
            } else {
                k -= 1;
            }
        }
        debug!("unshrinking: active set {} -> {}", before, self.active_size);
    }

    /// Rebuild the gradient of the inactive examples from `G_bar` and the
    /// free active examples
    pub(super) fn reconstruct_gradient(&mut self) {
        let n = self.active_size;
        let l = self.l;
        if n == l {
            return;
        }

        for j in n..l {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let nr_free = (0..n).filter(|&j| self.is_free(j)).count();
        if 2 * nr_free < n {
            debug!("few free variables ({nr_free} of {n}); disabling shrinking may be faster");
        }

        if nr_free * l > 2 * n * (l - n) {
            // Fetch the short rows of the inactive examples
            for i in n..l {
                self.q.column(i, n, &mut self.col_i);
                for j in 0..n {
                    if self.is_free(j) {
                        self.g[i] += self.alpha[j] * f64::from(self.col_i[j]);
                    }
                }
            }
        } else {
            for i in 0..n {
                if self.is_free(i) {
                    self.q.column(i, l, &mut self.col_i);
                    let alpha_i = self.alpha[i];
                    for j in n..l {
                        self.g[j] += alpha_i * f64::from(self.col_i[j]);
                    }
                }
            }
        }
    }
}
