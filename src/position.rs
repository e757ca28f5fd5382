//! # Time-dependent position model
//!
//! [`PositionModel`] answers "where was the target relative to the observer at
//! time `et`?" (km, plus an optional velocity in km/s). It follows the same
//! lifecycle as the orientation model:
//!
//! 1. bound to a [`PositionSource`] (`Kernel` backing), or [`detached`](PositionModel::detached);
//! 2. optionally cached once with `load_cache*`;
//! 3. optionally fit with [`set_polynomial`](PositionModel::set_polynomial): one
//!    polynomial per X/Y/Z channel, after which the cache is reloaded from the
//!    polynomials and the velocity is their analytic time derivative.
//!
//! Partials of the position and velocity with respect to each coefficient are
//! exposed for bundle adjustment.

use std::sync::Arc;

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cache_table::CacheTable;
use crate::constants::{BodyCode, EphemerisTime, FrameCode};
use crate::ephemeris_source::{AberrationCorrection, PositionSource};
use crate::fitting::{PolynomialCoefficients, PolynomialFitter, TimeNormalization};
use crate::kinematic_errors::KinematicError;
use crate::params::ModelParams;
use crate::time_cache::{time_grid, PositionState, TimeSeriesCache};

/// Cartesian channel of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coordinate {
    X,
    Y,
    Z,
}

impl Coordinate {
    pub fn index(self) -> usize {
        match self {
            Coordinate::X => 0,
            Coordinate::Y => 1,
            Coordinate::Z => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PositionBacking {
    Kernel {
        source: Arc<dyn PositionSource>,
        target: BodyCode,
        observer: BodyCode,
        frame: FrameCode,
        correction: AberrationCorrection,
    },
    Cached {
        cache: TimeSeriesCache<PositionState>,
        fit: Option<PolynomialCoefficients>,
    },
}

#[derive(Debug, Clone)]
pub struct PositionModel {
    backing: PositionBacking,
    params: ModelParams,
    degree: usize,
    override_normalization: Option<TimeNormalization>,
    et: Option<EphemerisTime>,
    state: PositionState,
    light_time: f64,
}

impl PositionModel {
    fn with_backing(backing: PositionBacking) -> Self {
        let params = ModelParams::default();
        PositionModel {
            backing,
            degree: params.degree,
            params,
            override_normalization: None,
            et: None,
            state: PositionState::default(),
            light_time: 0.0,
        }
    }

    /// Model querying `target` relative to `observer` in `frame` at each time.
    pub fn from_source(
        source: Arc<dyn PositionSource>,
        target: BodyCode,
        observer: BodyCode,
        frame: FrameCode,
        correction: AberrationCorrection,
    ) -> Self {
        Self::with_backing(PositionBacking::Kernel {
            source,
            target,
            observer,
            frame,
            correction,
        })
    }

    pub fn detached() -> Self {
        Self::with_backing(PositionBacking::Cached {
            cache: TimeSeriesCache::new(),
            fit: None,
        })
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.degree = params.degree;
        if let PositionBacking::Cached { cache, .. } = &mut self.backing {
            cache.set_extrapolation(params.extrapolation);
        }
        self.params = params;
        self
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn backing(&self) -> &PositionBacking {
        &self.backing
    }

    pub fn is_cached(&self) -> bool {
        self.cache().is_some()
    }

    pub fn is_fitted(&self) -> bool {
        self.fit().is_some()
    }

    fn fit(&self) -> Option<&PolynomialCoefficients> {
        match &self.backing {
            PositionBacking::Cached { fit, .. } => fit.as_ref(),
            _ => None,
        }
    }

    fn cache(&self) -> Option<&TimeSeriesCache<PositionState>> {
        match &self.backing {
            PositionBacking::Cached { cache, .. } if !cache.is_empty() => Some(cache),
            _ => None,
        }
    }

    /// Source state and light time at `et`, `None` for a cached model.
    fn query_source(
        &self,
        et: EphemerisTime,
    ) -> Option<Result<(PositionState, f64), KinematicError>> {
        let PositionBacking::Kernel {
            source,
            target,
            observer,
            frame,
            correction,
        } = &self.backing
        else {
            return None;
        };
        let query_et = et + self.params.time_bias;
        trace!(et = query_et, target, observer, frame, %correction, "position source query");
        Some(
            source
                .state(*target, *observer, query_et, *frame, *correction)
                .map(|s| (s.to_position_state(), s.light_time))
                .map_err(KinematicError::from),
        )
    }

    fn ensure_loadable(&self) -> Result<(), KinematicError> {
        if self.is_cached() {
            Err(KinematicError::CacheAlreadyLoaded)
        } else {
            Ok(())
        }
    }

    fn install_cache(
        &mut self,
        samples: impl IntoIterator<Item = (EphemerisTime, PositionState)>,
    ) -> Result<(), KinematicError> {
        let mut cache = TimeSeriesCache::new().with_extrapolation(self.params.extrapolation);
        for (et, state) in samples {
            cache.append(et, state)?;
        }
        if cache.is_empty() {
            return Err(KinematicError::CacheNotLoaded);
        }
        debug!(samples = cache.len(), "position cache loaded");
        self.commit_cache(cache, None)
    }

    /// Swap in a cached backing once the current time resolves against it.
    /// On error nothing is replaced.
    fn commit_cache(
        &mut self,
        cache: TimeSeriesCache<PositionState>,
        fit: Option<PolynomialCoefficients>,
    ) -> Result<(), KinematicError> {
        if let Some(et) = self.et {
            self.state = cache.evaluate(et)?;
        }
        self.backing = PositionBacking::Cached { cache, fit };
        self.light_time = 0.0;
        Ok(())
    }

    /// Sample the source at `count` evenly spaced times in `[start, end]` and cache the states.
    ///
    /// Arguments
    /// -----------------
    /// * `start`, `end` – Cached interval in ephemeris seconds; `start == end` only with `count == 1`.
    /// * `count` – Number of samples, at least one.
    ///
    /// The light time is cleared, and a time set earlier is resolved again against the cache.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::CacheAlreadyLoaded`] if the model is already cached.
    /// * [`KinematicError::NoSource`] for a detached model.
    /// * [`KinematicError::InvalidTimeRange`] for an invalid grid.
    /// * Any source failure, or a current time the new cache rejects under
    ///   [`ExtrapolationPolicy::Reject`](crate::ExtrapolationPolicy::Reject);
    ///   the model is left unchanged in that case.
    pub fn load_cache(
        &mut self,
        start: EphemerisTime,
        end: EphemerisTime,
        count: usize,
    ) -> Result<(), KinematicError> {
        self.ensure_loadable()?;
        let samples = time_grid(start, end, count)?
            .into_iter()
            .map(|et| {
                let (state, _) = self.query_source(et).ok_or(KinematicError::NoSource)??;
                Ok((et, state))
            })
            .collect::<Result<Vec<_>, KinematicError>>()?;
        self.install_cache(samples)
    }

    pub fn load_cache_time(&mut self, et: EphemerisTime) -> Result<(), KinematicError> {
        self.load_cache(et, et, 1)
    }

    pub fn load_cache_samples(
        &mut self,
        samples: Vec<(EphemerisTime, PositionState)>,
    ) -> Result<(), KinematicError> {
        self.ensure_loadable()?;
        self.install_cache(samples)
    }

    /// Cache the states of a persisted 4 or 7 field table.
    pub fn load_cache_table(&mut self, table: &CacheTable) -> Result<(), KinematicError> {
        self.ensure_loadable()?;
        let samples = table.to_positions()?;
        self.install_cache(samples)
    }

    pub fn cache_table(&self, name: &str) -> Result<CacheTable, KinematicError> {
        let cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?;
        Ok(CacheTable::from_positions(name, cache.samples()))
    }

    /// Resolve the state at `et`. Repeated calls with the same `et` do nothing.
    ///
    /// Arguments
    /// -----------------
    /// * `et` – Ephemeris time in seconds past J2000, before any time bias.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::NoSource`] for a detached model without cache.
    /// * [`KinematicError::OutsideCacheRange`] under the reject policy.
    /// * Any source failure. The previous state and time are kept.
    pub fn set_time(&mut self, et: EphemerisTime) -> Result<(), KinematicError> {
        if self.et == Some(et) {
            return Ok(());
        }
        match self.query_source(et) {
            Some(answer) => {
                let (state, light_time) = answer?;
                self.state = state;
                self.light_time = light_time;
            }
            None => {
                let PositionBacking::Cached { cache, .. } = &self.backing else {
                    return Err(KinematicError::NoSource);
                };
                self.state = cache.evaluate(et)?;
            }
        }
        self.et = Some(et);
        Ok(())
    }

    pub fn set_epoch(&mut self, epoch: &Epoch) -> Result<(), KinematicError> {
        self.set_time(epoch.to_et_seconds())
    }

    pub fn time(&self) -> Option<EphemerisTime> {
        self.et
    }

    pub fn coordinate(&self) -> &Vector3<f64> {
        &self.state.position
    }

    pub fn velocity(&self) -> Option<&Vector3<f64>> {
        self.state.velocity.as_ref()
    }

    pub fn has_velocity(&self) -> bool {
        self.state.velocity.is_some()
    }

    /// One-way light time of the last source query (0 for cached models).
    pub fn light_time(&self) -> f64 {
        self.light_time
    }

    /// Linear extrapolation of the current state to `et`: `p + v·(et − et_current)`.
    ///
    /// Return
    /// ----------
    /// * The extrapolated position, or the current coordinate when there is no velocity
    ///   or no time has been set.
    pub fn extrapolate(&self, et: EphemerisTime) -> Vector3<f64> {
        match (self.et, self.state.velocity) {
            (Some(current), Some(v)) => self.state.position + v * (et - current),
            _ => self.state.position,
        }
    }

    pub fn normalization(&self) -> Result<TimeNormalization, KinematicError> {
        match self.fit() {
            Some(fit) => Ok(*fit.normalization()),
            None => self.normalization_for_fit(),
        }
    }

    pub fn base_time(&self) -> Result<EphemerisTime, KinematicError> {
        Ok(self.normalization()?.base_time)
    }

    pub fn time_scale(&self) -> Result<f64, KinematicError> {
        Ok(self.normalization()?.time_scale)
    }

    pub fn set_override_base_time(&mut self, base_time: EphemerisTime, time_scale: f64) {
        self.override_normalization = Some(TimeNormalization::new(base_time, time_scale));
    }

    fn normalization_for_fit(&self) -> Result<TimeNormalization, KinematicError> {
        if let Some(norm) = self.override_normalization {
            return Ok(norm);
        }
        let (first, last) = self
            .cache()
            .and_then(|c| c.time_range())
            .ok_or(KinematicError::CacheNotLoaded)?;
        Ok(TimeNormalization::from_range(first, last))
    }

    pub fn polynomial_degree(&self) -> usize {
        self.fit().map_or(self.degree, |fit| fit.degree())
    }

    /// Fit X, Y and Z independently and reload the cache (positions and velocities)
    /// from the polynomials.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` once the cache holds polynomial positions with their analytic velocities.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::CacheNotLoaded`] if the model has no cache.
    /// * Any least-squares failure; the cache and any previous fit are kept.
    pub fn set_polynomial(&mut self) -> Result<(), KinematicError> {
        let normalization = self.normalization_for_fit()?;
        let cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?;
        let samples: Vec<(EphemerisTime, [f64; 3])> = cache
            .samples()
            .iter()
            .map(|s| (s.et, s.value.position.into()))
            .collect();
        let coefficients =
            PolynomialFitter::new(self.degree, &self.params).fit(&samples, normalization)?;
        debug!(
            degree = coefficients.degree(),
            base_time = normalization.base_time,
            time_scale = normalization.time_scale,
            "position polynomial fit"
        );
        self.apply_fit(coefficients)
    }

    fn apply_fit(&mut self, coefficients: PolynomialCoefficients) -> Result<(), KinematicError> {
        let mut cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?.clone();
        cache.reload(|et| {
            Ok(PositionState::new(
                coefficients.evaluate(et).into(),
                Some(coefficients.time_derivative(et).into()),
            ))
        })?;
        debug!(samples = cache.len(), "position cache reloaded from polynomial");
        self.commit_cache(cache, Some(coefficients))
    }

    pub fn set_polynomial_coefficients(
        &mut self,
        coefficients: PolynomialCoefficients,
    ) -> Result<(), KinematicError> {
        let degree = coefficients.degree();
        self.apply_fit(coefficients)?;
        self.degree = degree;
        Ok(())
    }

    pub fn polynomial_coefficients(&self) -> Result<&PolynomialCoefficients, KinematicError> {
        self.fit().ok_or(KinematicError::PolynomialNotFitted)
    }

    pub fn set_polynomial_degree(&mut self, degree: usize) -> Result<(), KinematicError> {
        if let Some(fit) = self.fit().filter(|fit| fit.degree() != degree) {
            let resized = fit.with_degree(degree);
            self.apply_fit(resized)?;
        }
        self.degree = degree;
        Ok(())
    }

    fn partial_time(&self, fit: &PolynomialCoefficients) -> EphemerisTime {
        self.et.unwrap_or(fit.normalization().base_time)
    }

    /// `∂position/∂c`, with `c` the coefficient `index` of the `coordinate` polynomial.
    ///
    /// Arguments
    /// -----------------
    /// * `coordinate` – Polynomial being differentiated.
    /// * `index` – Coefficient order, `0..=degree`.
    ///
    /// Return
    /// ----------
    /// * A vector that is zero except along `coordinate`, evaluated at the current time
    ///   (the base time before any `set_time`).
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::PolynomialNotFitted`] without a fit.
    /// * [`KinematicError::CoefficientIndexOutOfRange`] if `index > degree`.
    pub fn coordinate_partial(
        &self,
        coordinate: Coordinate,
        index: usize,
    ) -> Result<Vector3<f64>, KinematicError> {
        let fit = self.polynomial_coefficients()?;
        let d = fit.coefficient_partial(self.partial_time(fit), index)?;
        let mut partial = Vector3::zeros();
        partial[coordinate.index()] = d;
        Ok(partial)
    }

    /// `∂velocity/∂c`, with `c` the coefficient `index` of the `coordinate` polynomial.
    ///
    /// Same arguments and errors as [`coordinate_partial`](Self::coordinate_partial);
    /// the derivative is divided by the time scale.
    pub fn velocity_partial(
        &self,
        coordinate: Coordinate,
        index: usize,
    ) -> Result<Vector3<f64>, KinematicError> {
        let fit = self.polynomial_coefficients()?;
        let d = fit.rate_partial(self.partial_time(fit), index)?;
        let mut partial = Vector3::zeros();
        partial[coordinate.index()] = d;
        Ok(partial)
    }
}
