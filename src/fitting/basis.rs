//! Basis functions for linear least squares.
//!
//! A [`BasisFunction`] maps an input vector to the list of *terms* whose linear
//! combination, weighted by the unknown coefficients, models one scalar output:
//!
//! ```text
//! f(x) = Σ cᵢ · termᵢ(x)
//! ```
//!
//! [`PolynomialUnivariate`] is the basis used by the kinematic fits
//! (`termᵢ(τ) = τⁱ`), and [`Polynomial`] holds a set of fitted coefficients for it.

use crate::kinematic_errors::KinematicError;

/// A linear basis: number of inputs, number of coefficients, and the term expansion.
pub trait BasisFunction {
    /// Number of independent variables expected by [`Self::expand`].
    fn variables(&self) -> usize;

    /// Number of coefficients (terms) of the basis.
    fn coefficients(&self) -> usize;

    /// Expand `input` into the term values, one per coefficient.
    ///
    /// Return
    /// ----------
    /// * The `coefficients()` term values, or [`KinematicError::InvalidInputDimension`]
    ///   if `input` does not have `variables()` entries.
    fn expand(&self, input: &[f64]) -> Result<Vec<f64>, KinematicError>;

    /// Evaluate `Σ cᵢ · termᵢ(input)`.
    fn evaluate(&self, coefficients: &[f64], input: &[f64]) -> Result<f64, KinematicError> {
        let terms = self.expand(input)?;
        Ok(terms
            .iter()
            .zip(coefficients)
            .map(|(term, coeff)| term * coeff)
            .sum())
    }
}

/// Univariate power basis `1, τ, τ², …, τ^degree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolynomialUnivariate {
    degree: usize,
}

impl PolynomialUnivariate {
    pub fn new(degree: usize) -> Self {
        PolynomialUnivariate { degree }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl BasisFunction for PolynomialUnivariate {
    fn variables(&self) -> usize {
        1
    }

    fn coefficients(&self) -> usize {
        self.degree + 1
    }

    fn expand(&self, input: &[f64]) -> Result<Vec<f64>, KinematicError> {
        let [tau] = input else {
            return Err(KinematicError::InvalidInputDimension {
                expected: 1,
                found: input.len(),
            });
        };

        let mut terms = Vec::with_capacity(self.degree + 1);
        let mut power = 1.0;
        for _ in 0..=self.degree {
            terms.push(power);
            power *= tau;
        }
        Ok(terms)
    }
}

/// A power series `Σ cᵢ · τⁱ` with owned coefficients (lowest order first).
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Polynomial { coefficients }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Degree of the series; an empty series is treated as degree 0.
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluate the series at `tau` with Horner's scheme.
    pub fn evaluate(&self, tau: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * tau + c)
    }

    /// First derivative with respect to the variable, `Σ i·cᵢ·τ^(i-1)`.
    pub fn derivative(&self, tau: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (i, c)| acc * tau + i as f64 * c)
    }

    /// Derivative with respect to coefficient `index`, i.e. `τ^index`.
    pub fn coefficient_derivative(&self, tau: f64, index: usize) -> Result<f64, KinematicError> {
        if index > self.degree() {
            return Err(KinematicError::CoefficientIndexOutOfRange {
                index,
                degree: self.degree(),
            });
        }
        Ok(tau.powi(index as i32))
    }
}
