//! Dense two-phase simplex for small linear programs.
//!
//! Solves
//!
//! ```text
//! minimize    cᵀx
//! subject to  A_eq·x  = b_eq
//!             A_ub·x ≤ b_ub
//!             l ≤ x ≤ u          (l, u may be infinite)
//! ```
//!
//! Variables are first rewritten as non-negative `y`: a finite lower bound
//! shifts the variable, a lone finite upper bound reflects it, a free
//! variable is split into `y⁺ − y⁻`, and a finite range `u − l` becomes an
//! extra `≤` row. Every row then gets a slack (for `≤` rows) and an
//! artificial, rows with negative right-hand side are negated, and the
//! tableau is driven through phase one (sum of artificials) and phase two
//! with Bland's rule. Redundant equality rows keep a zero artificial in the
//! basis and are otherwise ignored.
//!
//! Dual values follow the sensitivity convention `∂objective/∂b`, so
//! `ub_duals ≤ 0` at an optimum.

use crate::{array::Array, matrix::Matrix};
use nalgebra::DMatrix;
use so_core::{
    errors::{Error, Result},
    Real,
};

const PIVOT_TOL: Real = 1e-9;
const FEASIBILITY_TOL: Real = 1e-8;

/// Terminal status of a simplex solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// An optimal vertex was found.
    Optimal,
    /// Phase one could not drive the artificials to zero.
    Infeasible,
    /// The objective decreases without bound along a feasible ray.
    Unbounded,
    /// The pivot cap was hit before either phase finished.
    IterationLimit,
}

/// Result of [`LinearProgram::solve`].
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Terminal status.
    pub status: LpStatus,
    /// Primal point (meaningful only when optimal).
    pub x: Array,
    /// `cᵀx`.
    pub objective: Real,
    /// `∂objective/∂b_eq`, one per equality row.
    pub eq_duals: Array,
    /// `∂objective/∂b_ub`, one per inequality row.
    pub ub_duals: Array,
    /// Pivots performed over both phases.
    pub iterations: usize,
}

impl LpSolution {
    /// `status == Optimal`.
    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

/// A linear program in inequality form with explicit bounds.
///
/// Variables default to `x ≥ 0`; use [`LinearProgram::bounds`] for anything
/// else.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    c: Array,
    equalities: Option<(Matrix, Array)>,
    inequalities: Option<(Matrix, Array)>,
    lower: Array,
    upper: Array,
    max_iterations: usize,
}

impl LinearProgram {
    /// Minimize `cᵀx` over `x ≥ 0`.
    pub fn new(c: Array) -> Self {
        let n = c.size();
        Self {
            c,
            equalities: None,
            inequalities: None,
            lower: Array::zeros(n),
            upper: Array::from_element(n, Real::INFINITY),
            max_iterations: 10_000,
        }
    }

    fn check_block(&self, a: &Matrix, b: &Array) -> Result<()> {
        if a.cols() != self.c.size() {
            return Err(Error::DimensionMismatch {
                expected: self.c.size(),
                found: a.cols(),
            });
        }
        if a.rows() != b.size() {
            return Err(Error::DimensionMismatch {
                expected: a.rows(),
                found: b.size(),
            });
        }
        Ok(())
    }

    /// Add the equality rows `a·x = b`.
    pub fn equalities(mut self, a: Matrix, b: Array) -> Result<Self> {
        self.check_block(&a, &b)?;
        self.equalities = Some((a, b));
        Ok(self)
    }

    /// Add the inequality rows `a·x ≤ b`.
    pub fn inequalities(mut self, a: Matrix, b: Array) -> Result<Self> {
        self.check_block(&a, &b)?;
        self.inequalities = Some((a, b));
        Ok(self)
    }

    /// Replace the variable bounds.
    pub fn bounds(mut self, lower: Array, upper: Array) -> Result<Self> {
        for bound in [&lower, &upper] {
            if bound.size() != self.c.size() {
                return Err(Error::DimensionMismatch {
                    expected: self.c.size(),
                    found: bound.size(),
                });
            }
        }
        if lower.iter().zip(upper.iter()).any(|(l, u)| l > u || l.is_nan() || u.is_nan()) {
            return Err(Error::InvalidArgument("LP bounds are crossed or NaN".into()));
        }
        self.lower = lower;
        self.upper = upper;
        Ok(self)
    }

    /// Cap on the total number of pivots.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Run the two-phase simplex.
    pub fn solve(&self) -> Result<LpSolution> {
        let standard = StandardForm::build(self);
        let mut tableau = Tableau::new(&standard);
        let mut iterations = 0;

        // ── Phase one ────────────────────────────────────────────────────────
        tableau.load_phase_one_costs();
        let phase_one = tableau.iterate(tableau.art_start, self.max_iterations, &mut iterations);
        let infeasibility = -tableau.objective_entry();
        let scale = 1.0 + standard.rhs.iter().map(|b| b.abs()).sum::<Real>();
        let status = match phase_one {
            Pivoting::LimitReached => Some(LpStatus::IterationLimit),
            _ if infeasibility > FEASIBILITY_TOL * scale => Some(LpStatus::Infeasible),
            _ => None,
        };
        if let Some(status) = status {
            tracing::trace!(?status, iterations, infeasibility, "simplex phase one stopped");
            return Ok(self.finish(&standard, &tableau, status, iterations, false));
        }

        tableau.drive_out_artificials();

        // ── Phase two ────────────────────────────────────────────────────────
        tableau.load_phase_two_costs(&standard.cost);
        let status = match tableau.iterate(tableau.art_start, self.max_iterations, &mut iterations) {
            Pivoting::Optimal => LpStatus::Optimal,
            Pivoting::Unbounded => LpStatus::Unbounded,
            Pivoting::LimitReached => LpStatus::IterationLimit,
        };
        tracing::trace!(?status, iterations, "simplex finished");
        Ok(self.finish(&standard, &tableau, status, iterations, status == LpStatus::Optimal))
    }

    fn finish(
        &self,
        standard: &StandardForm,
        tableau: &Tableau,
        status: LpStatus,
        iterations: usize,
        with_duals: bool,
    ) -> LpSolution {
        let y = tableau.basic_solution(standard.n_y);
        let x: Vec<Real> = standard
            .offset
            .iter()
            .zip(&standard.terms)
            .map(|(o, terms)| o + terms.iter().map(|&(col, s)| s * y[col]).sum::<Real>())
            .collect();
        let x = Array::from_vec(x);
        let objective = self.c.dot(&x);

        let m_eq = self.equalities.as_ref().map_or(0, |(_, b)| b.size());
        let m_ub = self.inequalities.as_ref().map_or(0, |(_, b)| b.size());
        let (eq_duals, ub_duals) = if with_duals {
            let y_hat = tableau.duals(&standard.cost);
            let signed: Vec<Real> = y_hat
                .iter()
                .zip(&standard.row_sign)
                .map(|(d, s)| d * s)
                .collect();
            (
                Array::from_slice(&signed[..m_eq]),
                Array::from_slice(&signed[m_eq..m_eq + m_ub]),
            )
        } else {
            (Array::zeros(m_eq), Array::zeros(m_ub))
        };

        LpSolution {
            status,
            x,
            objective,
            eq_duals,
            ub_duals,
            iterations,
        }
    }
}

// ── Standard form ─────────────────────────────────────────────────────────────

/// `min costᵀy  s.t.  rows·y (=|≤) rhs,  y ≥ 0` with `x = offset + T·y`.
struct StandardForm {
    n_y: usize,
    offset: Vec<Real>,
    terms: Vec<Vec<(usize, Real)>>,
    cost: Vec<Real>,
    rows: Vec<Vec<Real>>,
    rhs: Vec<Real>,
    has_slack: Vec<bool>,
    row_sign: Vec<Real>,
}

impl StandardForm {
    fn build(lp: &LinearProgram) -> Self {
        let n = lp.c.size();
        let mut offset = vec![0.0; n];
        let mut terms: Vec<Vec<(usize, Real)>> = vec![Vec::new(); n];
        let mut ranges: Vec<(usize, Real)> = Vec::new();
        let mut n_y = 0;
        for j in 0..n {
            let (l, u) = (lp.lower[j], lp.upper[j]);
            if l.is_finite() {
                offset[j] = l;
                terms[j].push((n_y, 1.0));
                if u.is_finite() {
                    ranges.push((n_y, u - l));
                }
                n_y += 1;
            } else if u.is_finite() {
                offset[j] = u;
                terms[j].push((n_y, -1.0));
                n_y += 1;
            } else {
                terms[j].push((n_y, 1.0));
                terms[j].push((n_y + 1, -1.0));
                n_y += 2;
            }
        }

        let mut cost = vec![0.0; n_y];
        for (j, ts) in terms.iter().enumerate() {
            for &(col, s) in ts {
                cost[col] += lp.c[j] * s;
            }
        }

        let mut rows = Vec::new();
        let mut rhs = Vec::new();
        let mut has_slack = Vec::new();
        let blocks = [(&lp.equalities, false), (&lp.inequalities, true)];
        for (block, slack) in blocks {
            let Some((a, b)) = block else { continue };
            for i in 0..a.rows() {
                let mut coeffs = vec![0.0; n_y];
                let mut r = b[i];
                for j in 0..n {
                    let aij = a[(i, j)];
                    if aij == 0.0 {
                        continue;
                    }
                    r -= aij * offset[j];
                    for &(col, s) in &terms[j] {
                        coeffs[col] += aij * s;
                    }
                }
                rows.push(coeffs);
                rhs.push(r);
                has_slack.push(slack);
            }
        }
        for (col, width) in ranges {
            let mut coeffs = vec![0.0; n_y];
            coeffs[col] = 1.0;
            rows.push(coeffs);
            rhs.push(width);
            has_slack.push(true);
        }

        let row_sign = rhs.iter().map(|r| if *r < 0.0 { -1.0 } else { 1.0 }).collect();
        Self {
            n_y,
            offset,
            terms,
            cost,
            rows,
            rhs,
            has_slack,
            row_sign,
        }
    }
}

// ── Tableau ───────────────────────────────────────────────────────────────────

enum Pivoting {
    Optimal,
    Unbounded,
    LimitReached,
}

/// Rows `0..m` are constraints, row `m` holds reduced costs; the last column
/// is the right-hand side. Columns: structural, slacks, artificials.
struct Tableau {
    t: DMatrix<Real>,
    basis: Vec<usize>,
    m: usize,
    art_start: usize,
    rhs_col: usize,
}

impl Tableau {
    fn new(sf: &StandardForm) -> Self {
        let m = sf.rows.len();
        let n_slack = sf.has_slack.iter().filter(|s| **s).count();
        let art_start = sf.n_y + n_slack;
        let rhs_col = art_start + m;
        let mut t = DMatrix::zeros(m + 1, rhs_col + 1);
        let mut slack_col = sf.n_y;
        for i in 0..m {
            let sign = sf.row_sign[i];
            for (j, a) in sf.rows[i].iter().enumerate() {
                t[(i, j)] = sign * a;
            }
            if sf.has_slack[i] {
                t[(i, slack_col)] = sign;
                slack_col += 1;
            }
            t[(i, art_start + i)] = 1.0;
            t[(i, rhs_col)] = sign * sf.rhs[i];
        }
        Self {
            t,
            basis: (art_start..art_start + m).collect(),
            m,
            art_start,
            rhs_col,
        }
    }

    fn objective_entry(&self) -> Real {
        self.t[(self.m, self.rhs_col)]
    }

    fn load_phase_one_costs(&mut self) {
        for j in 0..=self.rhs_col {
            let column_sum: Real = (0..self.m).map(|i| self.t[(i, j)]).sum();
            let is_artificial = j >= self.art_start && j < self.rhs_col;
            self.t[(self.m, j)] = if is_artificial { 0.0 } else { -column_sum };
        }
    }

    fn cost_of(&self, col: usize, cost: &[Real]) -> Real {
        cost.get(col).copied().unwrap_or(0.0)
    }

    fn load_phase_two_costs(&mut self, cost: &[Real]) {
        for j in 0..=self.rhs_col {
            let c_j = if j == self.rhs_col { 0.0 } else { self.cost_of(j, cost) };
            let basic: Real = (0..self.m)
                .map(|i| self.cost_of(self.basis[i], cost) * self.t[(i, j)])
                .sum();
            self.t[(self.m, j)] = c_j - basic;
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let p = self.t[(row, col)];
        for j in 0..=self.rhs_col {
            self.t[(row, j)] /= p;
        }
        for i in 0..=self.m {
            if i == row {
                continue;
            }
            let factor = self.t[(i, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..=self.rhs_col {
                let delta = factor * self.t[(row, j)];
                self.t[(i, j)] -= delta;
            }
        }
        self.basis[row] = col;
    }

    /// Bland's rule: lowest-index improving column enters; among tied
    /// ratios the row whose basic variable has the lowest index leaves.
    fn iterate(&mut self, allowed: usize, max_iterations: usize, count: &mut usize) -> Pivoting {
        loop {
            let Some(col) = (0..allowed).find(|&j| self.t[(self.m, j)] < -PIVOT_TOL) else {
                return Pivoting::Optimal;
            };
            let mut leaving: Option<(usize, Real)> = None;
            for i in 0..self.m {
                let a = self.t[(i, col)];
                if a <= PIVOT_TOL {
                    continue;
                }
                let ratio = self.t[(i, self.rhs_col)] / a;
                leaving = match leaving {
                    Some((r, best))
                        if ratio > best + PIVOT_TOL
                            || (ratio >= best - PIVOT_TOL && self.basis[i] > self.basis[r]) =>
                    {
                        Some((r, best))
                    }
                    _ => Some((i, ratio)),
                };
            }
            let Some((row, _)) = leaving else {
                return Pivoting::Unbounded;
            };
            if *count >= max_iterations {
                return Pivoting::LimitReached;
            }
            self.pivot(row, col);
            *count += 1;
        }
    }

    /// Pivot every basic artificial out on any non-artificial column with a
    /// usable entry. Rows with none are redundant and keep their artificial.
    fn drive_out_artificials(&mut self) {
        for i in 0..self.m {
            if self.basis[i] < self.art_start {
                continue;
            }
            if let Some(col) = (0..self.art_start).find(|&j| self.t[(i, j)].abs() > PIVOT_TOL) {
                self.pivot(i, col);
            }
        }
    }

    fn basic_solution(&self, n_y: usize) -> Vec<Real> {
        let mut y = vec![0.0; n_y];
        for (i, &b) in self.basis.iter().enumerate() {
            if b < n_y {
                y[b] = self.t[(i, self.rhs_col)];
            }
        }
        y
    }

    /// `ŷ = c_Bᵀ B⁻¹`; the artificial block of the tableau holds `B⁻¹`.
    fn duals(&self, cost: &[Real]) -> Vec<Real> {
        (0..self.m)
            .map(|r| {
                (0..self.m)
                    .map(|k| self.cost_of(self.basis[k], cost) * self.t[(k, self.art_start + r)])
                    .sum()
            })
            .collect()
    }
}
