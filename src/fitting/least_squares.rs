//! Weighted linear least squares over a [`BasisFunction`].
//!
//! The solver accumulates *known* equations `f(xᵢ) ≈ yᵢ` with weights `wᵢ`,
//! builds the design matrix `A[i][j] = √wᵢ · termⱼ(xᵢ)` and right-hand side
//! `b[i] = √wᵢ · yᵢ`, then solves `min ‖A·c − b‖²` with the selected factorization:
//!
//! * [`SolveMethod::Qr`] – thin QR of `A`, back substitution on `R·c = Qᵀ·b`;
//! * [`SolveMethod::Svd`] – SVD pseudo-inverse, rank checked against the singular values;
//! * [`SolveMethod::NormalEquations`] – Cholesky factorization of `AᵀA·c = Aᵀb`.
//!
//! The tolerance is relative: a pivot of any method at or below `tolerance × largest pivot`
//! marks the system as rank deficient and the solve fails.
//!
//! A solver is a short-lived value: build it, feed it, solve it, read the
//! coefficients, drop it.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SVD_TOLERANCE;
use crate::kinematic_errors::KinematicError;

use super::basis::BasisFunction;

/// Factorization used by [`LeastSquares::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveMethod {
    #[default]
    Qr,
    Svd,
    NormalEquations,
}

#[derive(Debug, Clone)]
pub struct LeastSquares<'a, B: BasisFunction> {
    basis: &'a B,
    method: SolveMethod,
    svd_tolerance: f64,
    inputs: Vec<Vec<f64>>,
    expected: Vec<f64>,
    weights: Vec<f64>,
    solution: Option<Vec<f64>>,
    residuals: Vec<f64>,
}

impl<'a, B: BasisFunction> LeastSquares<'a, B> {
    pub fn new(basis: &'a B, method: SolveMethod) -> Self {
        LeastSquares {
            basis,
            method,
            svd_tolerance: DEFAULT_SVD_TOLERANCE,
            inputs: Vec::new(),
            expected: Vec::new(),
            weights: Vec::new(),
            solution: None,
            residuals: Vec::new(),
        }
    }

    pub fn with_svd_tolerance(mut self, tolerance: f64) -> Self {
        self.svd_tolerance = tolerance;
        self
    }

    /// Add one known equation with unit weight.
    pub fn add_known(&mut self, input: &[f64], expected: f64) -> Result<(), KinematicError> {
        self.add_weighted_known(input, expected, 1.0)
    }

    /// Add one known equation `f(input) ≈ expected` with the given weight.
    ///
    /// Adding a known invalidates any previous solution.
    pub fn add_weighted_known(
        &mut self,
        input: &[f64],
        expected: f64,
        weight: f64,
    ) -> Result<(), KinematicError> {
        if input.len() != self.basis.variables() {
            return Err(KinematicError::InvalidInputDimension {
                expected: self.basis.variables(),
                found: input.len(),
            });
        }
        if !(weight > 0.0) {
            return Err(KinematicError::InvalidWeight(weight));
        }

        self.inputs.push(input.to_vec());
        self.expected.push(expected);
        self.weights.push(weight);
        self.solution = None;
        self.residuals.clear();
        Ok(())
    }

    /// Number of known equations accumulated so far.
    pub fn knowns(&self) -> usize {
        self.expected.len()
    }

    /// Solve the accumulated system.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::UnderdeterminedSystem`] with fewer knowns than coefficients.
    /// * [`KinematicError::SingularSystem`] if the design matrix is rank deficient: a pivot
    ///   (QR diagonal, singular value, Cholesky pivot) at or below the SVD tolerance times
    ///   the largest one.
    pub fn solve(&mut self) -> Result<(), KinematicError> {
        let n = self.knowns();
        let m = self.basis.coefficients();
        if n < m {
            return Err(KinematicError::UnderdeterminedSystem {
                knowns: n,
                unknowns: m,
            });
        }

        let mut a = DMatrix::<f64>::zeros(n, m);
        let mut b = DVector::<f64>::zeros(n);
        for (row, (input, (&y, &w))) in self
            .inputs
            .iter()
            .zip(self.expected.iter().zip(&self.weights))
            .enumerate()
        {
            let sqrt_w = w.sqrt();
            for (col, term) in self.basis.expand(input)?.into_iter().enumerate() {
                a[(row, col)] = sqrt_w * term;
            }
            b[row] = sqrt_w * y;
        }

        let tolerance = self.svd_tolerance;
        let solution = match self.method {
            SolveMethod::Qr => {
                let qr = a.qr();
                let r = qr.r();
                if is_rank_deficient(r.diagonal().iter().map(|d| d.abs()), tolerance) {
                    return Err(KinematicError::SingularSystem(
                        "QR factor R is rank deficient".into(),
                    ));
                }
                let qtb = qr.q().transpose() * &b;
                r.solve_upper_triangular(&qtb).ok_or_else(|| {
                    KinematicError::SingularSystem("QR factor R is singular".into())
                })?
            }
            SolveMethod::Svd => {
                let svd = a.svd(true, true);
                let cutoff = tolerance * svd.singular_values.max();
                let rank = svd.rank(cutoff);
                if rank < m {
                    return Err(KinematicError::SingularSystem(format!(
                        "design matrix rank {rank} is below {m}"
                    )));
                }
                svd.solve(&b, cutoff)
                    .map_err(|e| KinematicError::SingularSystem(e.to_string()))?
            }
            SolveMethod::NormalEquations => {
                let at = a.transpose();
                let ata = &at * &a;
                let atb = &at * &b;
                let cholesky = ata.cholesky().ok_or_else(|| {
                    KinematicError::SingularSystem("normal matrix is not positive definite".into())
                })?;
                // pivots of AᵀA are the squared Cholesky diagonal
                let pivots = cholesky.l_dirty().diagonal().map(|l| l * l);
                if is_rank_deficient(pivots.iter().copied(), tolerance) {
                    return Err(KinematicError::SingularSystem(
                        "normal matrix is numerically singular".into(),
                    ));
                }
                cholesky.solve(&atb)
            }
        };

        if solution.iter().any(|c| !c.is_finite()) {
            return Err(KinematicError::SingularSystem(
                "solution is not finite".into(),
            ));
        }

        let coefficients: Vec<f64> = solution.iter().copied().collect();
        self.residuals = self
            .inputs
            .iter()
            .zip(&self.expected)
            .map(|(input, y)| Ok(y - self.basis.evaluate(&coefficients, input)?))
            .collect::<Result<_, KinematicError>>()?;
        self.solution = Some(coefficients);
        Ok(())
    }

    /// Fitted coefficients, lowest order first.
    pub fn coefficients(&self) -> Result<&[f64], KinematicError> {
        self.solution.as_deref().ok_or(KinematicError::NotSolved)
    }

    /// Evaluate the fitted function at `input`.
    pub fn evaluate(&self, input: &[f64]) -> Result<f64, KinematicError> {
        self.basis.evaluate(self.coefficients()?, input)
    }

    /// Unweighted residuals `yᵢ − f(xᵢ)` of every known, in insertion order.
    pub fn residuals(&self) -> Result<&[f64], KinematicError> {
        if self.solution.is_none() {
            return Err(KinematicError::NotSolved);
        }
        Ok(&self.residuals)
    }

    /// Root mean square of the residuals.
    pub fn rms(&self) -> Result<f64, KinematicError> {
        let residuals = self.residuals()?;
        if residuals.is_empty() {
            return Ok(0.0);
        }
        let sum_sq: f64 = residuals.iter().map(|r| r * r).sum();
        Ok((sum_sq / residuals.len() as f64).sqrt())
    }
}

/// True when the smallest pivot is not above `tolerance` times the largest one.
fn is_rank_deficient(pivots: impl Iterator<Item = f64>, tolerance: f64) -> bool {
    let (smallest, largest) = pivots.fold((f64::INFINITY, 0.0_f64), |(lo, hi), p| {
        (lo.min(p), hi.max(p))
    });
    largest == 0.0 || smallest <= tolerance * largest
}
