//! # Model parameters
//!
//! This module defines [`ModelParams`](crate::params::ModelParams) and its builder, which
//! control how an [`OrientationModel`](crate::rotation::OrientationModel) or a
//! [`PositionModel`](crate::position::PositionModel) fits, queries and extrapolates.
//!
//! ## Example
//!
//! ```rust
//! use kinecache::params::{ExtrapolationPolicy, ModelParams};
//! use kinecache::fitting::least_squares::SolveMethod;
//!
//! let params = ModelParams::builder()
//!     .degree(3)
//!     .solve_method(SolveMethod::Svd)
//!     .extrapolation(ExtrapolationPolicy::Reject)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.degree, 3);
//! ```
use std::cmp::Ordering::Greater;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_POLYNOMIAL_DEGREE, DEFAULT_SVD_TOLERANCE};
use crate::fitting::least_squares::SolveMethod;
use crate::kinematic_errors::KinematicError;

/// What a cache does with a query time outside its first/last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationPolicy {
    /// Continue the first (resp. last) interval past the cached range.
    #[default]
    Extend,
    /// Fail with [`KinematicError::OutsideCacheRange`].
    Reject,
}

/// Configuration of a kinematic model.
///
/// Fields
/// -----------------
/// * `degree` – polynomial degree requested for the next fit (the cache size may lower it).
/// * `solve_method` – factorization used by the least-squares solver for caches of 3+ samples.
/// * `svd_tolerance` – relative pivot threshold below which a fit is rejected as rank deficient.
/// * `extrapolation` – behaviour of cached lookups outside the cached time range.
/// * `time_bias` – seconds added to every time handed to the external source.
///
/// Defaults
/// -----------------
/// * `degree`: 2
/// * `solve_method`: [`SolveMethod::Qr`]
/// * `svd_tolerance`: 1e-12
/// * `extrapolation`: [`ExtrapolationPolicy::Extend`]
/// * `time_bias`: 0.0
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub degree: usize,
    pub solve_method: SolveMethod,
    pub svd_tolerance: f64,
    pub extrapolation: ExtrapolationPolicy,
    pub time_bias: f64,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`ModelParamsBuilder`] initialized with the defaults.
    pub fn builder() -> ModelParamsBuilder {
        ModelParamsBuilder::new()
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            degree: DEFAULT_POLYNOMIAL_DEGREE,
            solve_method: SolveMethod::Qr,
            svd_tolerance: DEFAULT_SVD_TOLERANCE,
            extrapolation: ExtrapolationPolicy::Extend,
            time_bias: 0.0,
        }
    }
}

/// Builder for [`ModelParams`], with validation.
#[derive(Debug, Clone)]
pub struct ModelParamsBuilder {
    params: ModelParams,
}

impl Default for ModelParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: ModelParams::default(),
        }
    }

    pub fn degree(mut self, v: usize) -> Self {
        self.params.degree = v;
        self
    }
    pub fn solve_method(mut self, v: SolveMethod) -> Self {
        self.params.solve_method = v;
        self
    }
    pub fn svd_tolerance(mut self, v: f64) -> Self {
        self.params.svd_tolerance = v;
        self
    }
    pub fn extrapolation(mut self, v: ExtrapolationPolicy) -> Self {
        self.params.extrapolation = v;
        self
    }
    pub fn time_bias(mut self, v: f64) -> Self {
        self.params.time_bias = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `svd_tolerance > 0.0`
    /// * `time_bias` is finite
    ///
    /// Returns
    /// -----------------
    /// * `Ok(ModelParams)` if all values are valid.
    /// * `Err(KinematicError::InvalidModelParams)` naming the first offending field otherwise.
    pub fn build(self) -> Result<ModelParams, KinematicError> {
        let p = &self.params;

        if !Self::gt0(p.svd_tolerance) {
            return Err(KinematicError::InvalidModelParams(format!(
                "svd_tolerance must be > 0 (got {})",
                p.svd_tolerance
            )));
        }
        if !p.time_bias.is_finite() {
            return Err(KinematicError::InvalidModelParams(format!(
                "time_bias must be finite (got {})",
                p.time_bias
            )));
        }

        Ok(self.params)
    }
}
