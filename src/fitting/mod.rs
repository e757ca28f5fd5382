//! # Polynomial approximation of cached kinematic channels
//!
//! Both kinematic models reduce their cache to three scalar channels (X/Y/Z for a
//! position, three Euler angles for an orientation) and approximate each one with
//! a power series in normalized time:
//!
//! ```text
//! value(τ) = Σ cᵢ · τⁱ,      τ = (et − base_time) / time_scale
//! ```
//!
//! This module holds the pieces shared by both models:
//!
//! * [`TimeNormalization`] – the `(base_time, time_scale)` pair, computed from the
//!   cache or overridden so several images of one observation share coefficients.
//! * [`PolynomialCoefficients`] – the fitted coefficients of the three channels,
//!   enough to rebuild the model without re-fitting.
//! * [`PolynomialFitter`] – the size-dependent fitting algorithm (closed form for
//!   one or two samples, least squares for three or more, optional branch-cut
//!   unwrapping of angular channels).
//!
//! ## See also
//! * [`basis`] – power basis and Horner evaluation.
//! * [`least_squares`] – weighted linear least squares solver.

pub mod basis;
pub mod least_squares;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::EphemerisTime;
use crate::kinematic_errors::KinematicError;
use crate::params::ModelParams;
use crate::rotation::euler::wrap_angle;

use basis::{Polynomial, PolynomialUnivariate};
use least_squares::{LeastSquares, SolveMethod};

/// Centering and scaling of ephemeris time into the fit variable `τ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeNormalization {
    pub base_time: EphemerisTime,
    pub time_scale: f64,
}

impl TimeNormalization {
    /// Normalization spanning a cache: `base = (first + last) / 2`, `scale = base − first`.
    ///
    /// A zero scale (single sample or equal end points) is replaced by `1.0`.
    pub fn from_range(first: EphemerisTime, last: EphemerisTime) -> Self {
        let base_time = (first + last) / 2.;
        Self::new(base_time, base_time - first)
    }

    /// Explicit normalization, with a zero scale replaced by `1.0`.
    pub fn new(base_time: EphemerisTime, time_scale: f64) -> Self {
        TimeNormalization {
            base_time,
            time_scale: if time_scale == 0.0 { 1.0 } else { time_scale },
        }
    }

    /// Normalized time `τ` of `et`.
    #[inline]
    pub fn tau(&self, et: EphemerisTime) -> f64 {
        (et - self.base_time) / self.time_scale
    }
}

/// Fitted coefficients of three channels, plus the normalization they refer to.
///
/// All three channels always have the same length `degree + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialCoefficients {
    channels: [Vec<f64>; 3],
    normalization: TimeNormalization,
}

impl PolynomialCoefficients {
    /// Build a coefficient set from the three channel lists.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::InconsistentCoefficients`] if the lists are empty or differ in length.
    pub fn new(
        channels: [Vec<f64>; 3],
        normalization: TimeNormalization,
    ) -> Result<Self, KinematicError> {
        let lengths = [channels[0].len(), channels[1].len(), channels[2].len()];
        if lengths[0] == 0 || lengths.iter().any(|&l| l != lengths[0]) {
            return Err(KinematicError::InconsistentCoefficients(lengths));
        }
        Ok(PolynomialCoefficients {
            channels,
            normalization,
        })
    }

    pub fn degree(&self) -> usize {
        self.channels[0].len() - 1
    }

    pub fn channels(&self) -> &[Vec<f64>; 3] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    pub fn normalization(&self) -> &TimeNormalization {
        &self.normalization
    }

    /// Same polynomials at another degree: zero-extended when growing, truncated when shrinking.
    pub fn with_degree(&self, degree: usize) -> Self {
        let resize = |c: &Vec<f64>| {
            let mut c = c.clone();
            c.resize(degree + 1, 0.0);
            c
        };
        PolynomialCoefficients {
            channels: [
                resize(&self.channels[0]),
                resize(&self.channels[1]),
                resize(&self.channels[2]),
            ],
            normalization: self.normalization,
        }
    }

    fn polynomials(&self) -> [Polynomial; 3] {
        self.channels.clone().map(Polynomial::new)
    }

    /// Value of the three channels at `et`.
    pub fn evaluate(&self, et: EphemerisTime) -> [f64; 3] {
        let tau = self.normalization.tau(et);
        self.polynomials().map(|p| p.evaluate(tau))
    }

    /// Time derivative of the three channels at `et` (per second).
    pub fn time_derivative(&self, et: EphemerisTime) -> [f64; 3] {
        let tau = self.normalization.tau(et);
        let scale = self.normalization.time_scale;
        self.polynomials().map(|p| p.derivative(tau) / scale)
    }

    /// Derivative of any channel value with respect to its coefficient `index`: `τ^index`.
    pub fn coefficient_partial(
        &self,
        et: EphemerisTime,
        index: usize,
    ) -> Result<f64, KinematicError> {
        Polynomial::new(self.channels[0].clone())
            .coefficient_derivative(self.normalization.tau(et), index)
    }

    /// Derivative of a channel's time derivative with respect to coefficient `index`:
    /// `index · τ^(index−1) / time_scale`.
    pub fn rate_partial(&self, et: EphemerisTime, index: usize) -> Result<f64, KinematicError> {
        let degree = self.degree();
        if index > degree {
            return Err(KinematicError::CoefficientIndexOutOfRange { index, degree });
        }
        if index == 0 {
            return Ok(0.0);
        }
        let tau = self.normalization.tau(et);
        Ok(index as f64 * tau.powi(index as i32 - 1) / self.normalization.time_scale)
    }
}

/// Size-dependent polynomial fit of three scalar channels.
///
/// Algorithm
/// -----------------
/// * 1 sample: degree 0, the coefficient is the sample value.
/// * 2 samples: degree 1, the line through both points (no least squares).
/// * 3+ samples: one least-squares solve per channel at the requested degree,
///   lowered to `n − 1` when the cache is too short for it.
///
/// Channels flagged in `wrapped` are angles with a ±π branch cut: every value
/// after the first is moved by ±2π to lie within π of the **first** value of the
/// series before it reaches the fit.
#[derive(Debug, Clone)]
pub struct PolynomialFitter {
    degree: usize,
    method: SolveMethod,
    svd_tolerance: f64,
    wrapped: [bool; 3],
}

impl PolynomialFitter {
    pub fn new(degree: usize, params: &ModelParams) -> Self {
        PolynomialFitter {
            degree,
            method: params.solve_method,
            svd_tolerance: params.svd_tolerance,
            wrapped: [false; 3],
        }
    }

    pub fn with_wrapped_channels(mut self, wrapped: [bool; 3]) -> Self {
        self.wrapped = wrapped;
        self
    }

    /// Fit the channel samples `(et, [v0, v1, v2])`, given in time order.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::CacheNotLoaded`] if `samples` is empty.
    /// * Any least-squares failure for caches of three samples or more.
    pub fn fit(
        &self,
        samples: &[(EphemerisTime, [f64; 3])],
        normalization: TimeNormalization,
    ) -> Result<PolynomialCoefficients, KinematicError> {
        let Some((_, first)) = samples.first() else {
            return Err(KinematicError::CacheNotLoaded);
        };

        let values: Vec<(f64, [f64; 3])> = samples
            .iter()
            .map(|(et, v)| {
                let mut v = *v;
                for channel in 0..3 {
                    if self.wrapped[channel] {
                        v[channel] = wrap_angle(first[channel], v[channel]);
                    }
                }
                (normalization.tau(*et), v)
            })
            .collect();

        let channels = match values.as_slice() {
            [(_, v)] => {
                if self.degree != 0 {
                    debug!(requested = self.degree, "single sample cache, fitting degree 0");
                }
                [vec![v[0]], vec![v[1]], vec![v[2]]]
            }
            [(tau0, v0), (tau1, v1)] => {
                if self.degree != 1 {
                    debug!(requested = self.degree, "two sample cache, fitting degree 1");
                }
                let line = |channel: usize| {
                    let slope = if tau1 != tau0 {
                        (v1[channel] - v0[channel]) / (tau1 - tau0)
                    } else {
                        0.0
                    };
                    vec![v0[channel] - slope * tau0, slope]
                };
                [line(0), line(1), line(2)]
            }
            _ => {
                let degree = if self.degree >= values.len() {
                    warn!(
                        requested = self.degree,
                        samples = values.len(),
                        "polynomial degree lowered to fit the cache size"
                    );
                    values.len() - 1
                } else {
                    self.degree
                };
                let basis = PolynomialUnivariate::new(degree);
                let solve_channel = |channel: usize| -> Result<Vec<f64>, KinematicError> {
                    let mut lsq = LeastSquares::new(&basis, self.method)
                        .with_svd_tolerance(self.svd_tolerance);
                    for (tau, v) in &values {
                        lsq.add_known(&[*tau], v[channel])?;
                    }
                    lsq.solve()?;
                    debug!(channel, rms = lsq.rms()?, "channel fit");
                    Ok(lsq.coefficients()?.to_vec())
                };
                [solve_channel(0)?, solve_channel(1)?, solve_channel(2)?]
            }
        };

        PolynomialCoefficients::new(channels, normalization)
    }
}
