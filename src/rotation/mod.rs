//! # Time-dependent orientation model
//!
//! [`OrientationModel`] answers "how was the instrument pointed at time `et`?" as a
//! rotation from the reference frame (usually J2000) to the instrument frame.
//!
//! The rotation has two factors:
//!
//! ```text
//! matrix(et) = TC · CJ(et)
//! ```
//!
//! * `CJ(et)` – the time-based rotation, produced by the active backing.
//! * `TC` – an optional constant rotation (e.g. spacecraft bus → instrument), identity by default.
//!
//! ## Backings
//!
//! | backing  | `set_time` resolves `CJ` by                                       |
//! |----------|-------------------------------------------------------------------|
//! | `Kernel` | one call to an injected [`OrientationSource`]                     |
//! | `Nadir`  | a two-vector frame built from a [`PositionSource`] state          |
//! | `Cached` | axis-angle interpolation in a [`TimeSeriesCache`] of rotations    |
//!
//! `Kernel` and `Nadir` models become `Cached` with one of the `load_cache*`
//! methods. A cached model can then be fit with [`OrientationModel::set_polynomial`]:
//! every cached rotation is decomposed into three Euler angles, one polynomial in
//! normalized time is fit per angle, and the cache is reloaded in place from the
//! polynomials at the original timestamps. Partial derivatives with respect to the
//! polynomial coefficients are then available for bundle adjustment.
//!
//! ## Example
//!
//! ```
//! use kinecache::rotation::OrientationModel;
//! use nalgebra::{Rotation3, Vector3};
//!
//! let mut model = OrientationModel::detached();
//! model
//!     .load_cache_samples(vec![
//!         (0.0, Rotation3::identity()),
//!         (10.0, Rotation3::from_axis_angle(&Vector3::z_axis(), 1.0)),
//!     ])
//!     .unwrap();
//! model.set_time(5.0).unwrap();
//! assert!((model.time_based_matrix().angle() - 0.5).abs() < 1e-12);
//! ```
//!
//! ## See also
//! * [`euler`] – Euler composition, decomposition and angle wrapping.
//! * [`nadir`] – nadir pointing geometry.

pub mod euler;
pub mod nadir;

use std::sync::Arc;

use hifitime::Epoch;
use nalgebra::{Matrix3, Rotation3, Vector3};
use tracing::{debug, trace};

use crate::cache_table::CacheTable;
use crate::constants::{EphemerisTime, FrameCode, Radian};
use crate::ephemeris_source::{OrientationSource, PositionSource};
use crate::fitting::{PolynomialCoefficients, PolynomialFitter, TimeNormalization};
use crate::kinematic_errors::KinematicError;
use crate::params::ModelParams;
use crate::time_cache::{time_grid, TimeSeriesCache};

use euler::{
    euler_to_rotation, frame_rotation, frame_rotation_derivative, rotation_to_euler, EulerAngle,
    EulerAxes,
};
use nadir::NadirGeometry;

/// Where the time-based rotation comes from.
#[derive(Debug, Clone)]
pub enum RotationBacking {
    Kernel {
        source: Arc<dyn OrientationSource>,
        from_frame: FrameCode,
        to_frame: FrameCode,
    },
    Nadir {
        source: Arc<dyn PositionSource>,
        geometry: NadirGeometry,
    },
    Cached {
        cache: TimeSeriesCache<Rotation3<f64>>,
        fit: Option<PolynomialCoefficients>,
    },
}

#[derive(Debug, Clone)]
pub struct OrientationModel {
    backing: RotationBacking,
    params: ModelParams,
    axes: EulerAxes,
    degree: usize,
    override_normalization: Option<TimeNormalization>,
    constant_rotation: Rotation3<f64>,
    et: Option<EphemerisTime>,
    time_based: Rotation3<f64>,
}

impl OrientationModel {
    fn with_backing(backing: RotationBacking) -> Self {
        let params = ModelParams::default();
        OrientationModel {
            backing,
            degree: params.degree,
            params,
            axes: EulerAxes::default(),
            override_normalization: None,
            constant_rotation: Rotation3::identity(),
            et: None,
            time_based: Rotation3::identity(),
        }
    }

    /// Model reading the rotation `from_frame → to_frame` from `source` at each time.
    pub fn from_source(
        source: Arc<dyn OrientationSource>,
        from_frame: FrameCode,
        to_frame: FrameCode,
    ) -> Self {
        Self::with_backing(RotationBacking::Kernel {
            source,
            from_frame,
            to_frame,
        })
    }

    /// Nadir-pointed model derived from the spacecraft state in `source`.
    pub fn nadir(source: Arc<dyn PositionSource>, geometry: NadirGeometry) -> Self {
        Self::with_backing(RotationBacking::Nadir { source, geometry })
    }

    /// Model with no source, to be filled from a table, samples or coefficients.
    pub fn detached() -> Self {
        Self::with_backing(RotationBacking::Cached {
            cache: TimeSeriesCache::new(),
            fit: None,
        })
    }

    /// Replace the model parameters. The requested degree becomes `params.degree`.
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.degree = params.degree;
        if let RotationBacking::Cached { cache, .. } = &mut self.backing {
            cache.set_extrapolation(params.extrapolation);
        }
        self.params = params;
        self
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn backing(&self) -> &RotationBacking {
        &self.backing
    }

    pub fn is_cached(&self) -> bool {
        matches!(&self.backing, RotationBacking::Cached { cache, .. } if !cache.is_empty())
    }

    pub fn is_fitted(&self) -> bool {
        self.fit().is_some()
    }

    fn fit(&self) -> Option<&PolynomialCoefficients> {
        match &self.backing {
            RotationBacking::Cached { fit, .. } => fit.as_ref(),
            _ => None,
        }
    }

    fn cache(&self) -> Option<&TimeSeriesCache<Rotation3<f64>>> {
        match &self.backing {
            RotationBacking::Cached { cache, .. } if !cache.is_empty() => Some(cache),
            _ => None,
        }
    }

    /// Time-based rotation straight from the live backing, `None` for a cached model.
    fn query_source(&self, et: EphemerisTime) -> Option<Result<Rotation3<f64>, KinematicError>> {
        let query_et = et + self.params.time_bias;
        match &self.backing {
            RotationBacking::Kernel {
                source,
                from_frame,
                to_frame,
            } => {
                trace!(et = query_et, from_frame, to_frame, "orientation source query");
                Some(
                    source
                        .orientation(*from_frame, *to_frame, query_et)
                        .map_err(KinematicError::from),
                )
            }
            RotationBacking::Nadir { source, geometry } => {
                trace!(et = query_et, spacecraft = geometry.spacecraft, "nadir query");
                Some(geometry.rotation(source.as_ref(), query_et))
            }
            RotationBacking::Cached { .. } => None,
        }
    }

    fn ensure_loadable(&self) -> Result<(), KinematicError> {
        match &self.backing {
            RotationBacking::Cached { cache, .. } if !cache.is_empty() => {
                Err(KinematicError::CacheAlreadyLoaded)
            }
            _ => Ok(()),
        }
    }

    fn install_cache(
        &mut self,
        samples: impl IntoIterator<Item = (EphemerisTime, Rotation3<f64>)>,
    ) -> Result<(), KinematicError> {
        let mut cache = TimeSeriesCache::new().with_extrapolation(self.params.extrapolation);
        for (et, rotation) in samples {
            cache.append(et, rotation)?;
        }
        if cache.is_empty() {
            return Err(KinematicError::CacheNotLoaded);
        }
        debug!(samples = cache.len(), "orientation cache loaded");
        self.commit_cache(cache, None)
    }

    /// Swap in a cached backing once the current time resolves against it.
    /// On error nothing is replaced.
    fn commit_cache(
        &mut self,
        cache: TimeSeriesCache<Rotation3<f64>>,
        fit: Option<PolynomialCoefficients>,
    ) -> Result<(), KinematicError> {
        if let Some(et) = self.et {
            self.time_based = cache.evaluate(et)?;
        }
        self.backing = RotationBacking::Cached { cache, fit };
        Ok(())
    }

    /// Sample the source at `count` evenly spaced times in `[start, end]` and cache the rotations.
    ///
    /// Arguments
    /// -----------------
    /// * `start`, `end` – Cached interval in ephemeris seconds; `start == end` only with `count == 1`.
    /// * `count` – Number of samples, at least one.
    ///
    /// If a time was already set, it is resolved again against the new cache.
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
        let times = time_grid(start, end, count)?;
        let samples = times
            .into_iter()
            .map(|et| {
                let rotation = self.query_source(et).ok_or(KinematicError::NoSource)??;
                Ok((et, rotation))
            })
            .collect::<Result<Vec<_>, KinematicError>>()?;
        self.install_cache(samples)
    }

    /// Single-sample cache at `et`, typical of framing cameras.
    pub fn load_cache_time(&mut self, et: EphemerisTime) -> Result<(), KinematicError> {
        self.load_cache(et, et, 1)
    }

    /// Cache the given `(et, rotation)` samples, in time order.
    pub fn load_cache_samples(
        &mut self,
        samples: Vec<(EphemerisTime, Rotation3<f64>)>,
    ) -> Result<(), KinematicError> {
        self.ensure_loadable()?;
        self.install_cache(samples)
    }

    /// Cache the rotations of a persisted quaternion table.
    pub fn load_cache_table(&mut self, table: &CacheTable) -> Result<(), KinematicError> {
        self.ensure_loadable()?;
        let samples = table.to_rotations()?;
        self.install_cache(samples)
    }

    /// Quaternion table of the current cache, in insertion order.
    pub fn cache_table(&self, name: &str) -> Result<CacheTable, KinematicError> {
        let cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?;
        Ok(CacheTable::from_rotations(name, cache.samples()))
    }

    /// Resolve the rotation at `et`. Repeated calls with the same `et` do nothing.
    ///
    /// Arguments
    /// -----------------
    /// * `et` – Ephemeris time in seconds past J2000, before any time bias.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::NoSource`] for a detached model without cache.
    /// * [`KinematicError::OutsideCacheRange`] under the reject policy.
    /// * Any source failure. The previous rotation and time are kept.
    pub fn set_time(&mut self, et: EphemerisTime) -> Result<(), KinematicError> {
        if self.et == Some(et) {
            return Ok(());
        }
        let rotation = match self.query_source(et) {
            Some(rotation) => rotation?,
            None => match &self.backing {
                RotationBacking::Cached { cache, .. } => cache.evaluate(et)?,
                _ => return Err(KinematicError::NoSource),
            },
        };
        self.time_based = rotation;
        self.et = Some(et);
        Ok(())
    }

    pub fn set_epoch(&mut self, epoch: &Epoch) -> Result<(), KinematicError> {
        self.set_time(epoch.to_et_seconds())
    }

    /// Last time given to [`set_time`](Self::set_time).
    pub fn time(&self) -> Option<EphemerisTime> {
        self.et
    }

    /// Full rotation `TC · CJ` from the reference frame to the instrument frame.
    pub fn matrix(&self) -> Rotation3<f64> {
        self.constant_rotation * self.time_based
    }

    /// Time-based part `CJ`, identity before the first [`set_time`](Self::set_time).
    pub fn time_based_matrix(&self) -> &Rotation3<f64> {
        &self.time_based
    }

    pub fn constant_rotation(&self) -> &Rotation3<f64> {
        &self.constant_rotation
    }

    pub fn set_constant_rotation(&mut self, rotation: Rotation3<f64>) {
        self.constant_rotation = rotation;
    }

    /// Reference-frame vector expressed in the instrument frame.
    pub fn reference_to_frame(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.matrix() * v
    }

    /// Instrument-frame vector expressed in the reference frame.
    pub fn frame_to_reference(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.matrix().inverse() * v
    }

    /// Euler angles of the current time-based rotation for an arbitrary axis order.
    pub fn angles(&self, axes: &EulerAxes) -> [Radian; 3] {
        rotation_to_euler(&self.time_based, axes)
    }

    pub fn axes(&self) -> &EulerAxes {
        &self.axes
    }

    /// Axes used to decompose the cache for fitting (default 3-1-3).
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::InvalidAxis`] / [`KinematicError::InvalidAxisSequence`].
    /// * [`KinematicError::AxesLockedByFit`] once a polynomial has been fit.
    pub fn set_axes(&mut self, axis1: i32, axis2: i32, axis3: i32) -> Result<(), KinematicError> {
        let axes = EulerAxes::new(axis1, axis2, axis3)?;
        if self.is_fitted() {
            return Err(KinematicError::AxesLockedByFit);
        }
        self.axes = axes;
        Ok(())
    }

    /// Normalization of the next or current fit: the fitted one, else the override,
    /// else the span of the cache.
    pub fn normalization(&self) -> Result<TimeNormalization, KinematicError> {
        if let Some(fit) = self.fit() {
            return Ok(*fit.normalization());
        }
        if let Some(norm) = self.override_normalization {
            return Ok(norm);
        }
        let (first, last) = self
            .cache()
            .and_then(|c| c.time_range())
            .ok_or(KinematicError::CacheNotLoaded)?;
        Ok(TimeNormalization::from_range(first, last))
    }

    pub fn base_time(&self) -> Result<EphemerisTime, KinematicError> {
        Ok(self.normalization()?.base_time)
    }

    pub fn time_scale(&self) -> Result<f64, KinematicError> {
        Ok(self.normalization()?.time_scale)
    }

    /// Fix the normalization used by subsequent fits. A zero `time_scale` becomes `1.0`.
    pub fn set_override_base_time(&mut self, base_time: EphemerisTime, time_scale: f64) {
        self.override_normalization = Some(TimeNormalization::new(base_time, time_scale));
    }

    /// Degree of the current fit, or the degree requested for the next one.
    pub fn polynomial_degree(&self) -> usize {
        self.fit().map_or(self.degree, |fit| fit.degree())
    }

    /// Fit one polynomial per Euler angle to the cache and reload the cache from it.
    ///
    /// Angles 1 and 3 are unwrapped against the first sample before fitting.
    /// The degree is the one given to [`set_polynomial_degree`](Self::set_polynomial_degree),
    /// lowered to `samples − 1` for short caches.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` once the coefficients are stored and every cached rotation is replaced
    ///   by its polynomial value; the current time is resolved again.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::CacheNotLoaded`] if the model has no cache.
    /// * Any least-squares failure.
    pub fn set_polynomial(&mut self) -> Result<(), KinematicError> {
        let normalization = self.normalization_for_fit()?;
        let cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?;
        let samples: Vec<(EphemerisTime, [f64; 3])> = cache
            .samples()
            .iter()
            .map(|s| (s.et, rotation_to_euler(&s.value, &self.axes)))
            .collect();
        let coefficients = PolynomialFitter::new(self.degree, &self.params)
            .with_wrapped_channels([true, false, true])
            .fit(&samples, normalization)?;
        debug!(
            degree = coefficients.degree(),
            base_time = normalization.base_time,
            time_scale = normalization.time_scale,
            "orientation polynomial fit"
        );
        self.apply_fit(coefficients)
    }

    fn normalization_for_fit(&self) -> Result<TimeNormalization, KinematicError> {
        match self.override_normalization {
            Some(norm) => Ok(norm),
            None => {
                let (first, last) = self
                    .cache()
                    .and_then(|c| c.time_range())
                    .ok_or(KinematicError::CacheNotLoaded)?;
                Ok(TimeNormalization::from_range(first, last))
            }
        }
    }

    fn apply_fit(&mut self, coefficients: PolynomialCoefficients) -> Result<(), KinematicError> {
        let mut cache = self.cache().ok_or(KinematicError::CacheNotLoaded)?.clone();
        cache.reload(|et| Ok(euler_to_rotation(coefficients.evaluate(et), &self.axes)))?;
        debug!(samples = cache.len(), "orientation cache reloaded from polynomial");
        self.commit_cache(cache, Some(coefficients))
    }

    /// Install previously fitted coefficients (in the current Euler axes) without re-fitting.
    ///
    /// The cache must be loaded: its timestamps are where the polynomials are reloaded.
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

    /// Record the degree of the next fit, or re-derive the current fit at `degree`
    /// (zero-extended or truncated) and reload the cache.
    pub fn set_polynomial_degree(&mut self, degree: usize) -> Result<(), KinematicError> {
        if let Some(fit) = self.fit().filter(|fit| fit.degree() != degree) {
            let resized = fit.with_degree(degree);
            self.apply_fit(resized)?;
        }
        self.degree = degree;
        Ok(())
    }

    /// Fitted Euler angles at the current time (base time before any `set_time`).
    fn fitted_angles(&self, fit: &PolynomialCoefficients) -> [Radian; 3] {
        fit.evaluate(self.et.unwrap_or(fit.normalization().base_time))
    }

    /// Derivative of a fitted angle with respect to its coefficient `index` at the current time.
    pub fn d_polynomial(&self, index: usize) -> Result<f64, KinematicError> {
        let fit = self.polynomial_coefficients()?;
        let et = self.et.unwrap_or(fit.normalization().base_time);
        fit.coefficient_partial(et, index)
    }

    /// `∂(matrix · v)/∂c`, with `c` the coefficient `index` of the polynomial of `angle`.
    ///
    /// The derivative of the differentiated elementary rotation is chained through the
    /// two others in composition order, then through the constant rotation.
    ///
    /// Arguments
    /// -----------------
    /// * `v` – Vector expressed in the reference frame.
    /// * `angle` – Which of the three Euler angles is differentiated.
    /// * `index` – Coefficient order, `0..=degree`.
    ///
    /// Return
    /// ----------
    /// * The partial derivative in the instrument frame, evaluated at the current time
    ///   (the base time before any `set_time`).
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::PolynomialNotFitted`] without a fit.
    /// * [`KinematicError::CoefficientIndexOutOfRange`] if `index > degree`.
    pub fn to_reference_partial(
        &self,
        v: &Vector3<f64>,
        angle: EulerAngle,
        index: usize,
    ) -> Result<Vector3<f64>, KinematicError> {
        let fit = self.polynomial_coefficients()?;
        let d_angle = self.d_polynomial(index)?;
        let angles = self.fitted_angles(fit);
        let axes = self.axes.as_array();

        let factors: Vec<Matrix3<f64>> = (0..3)
            .map(|k| {
                if k == angle.index() {
                    frame_rotation_derivative(angles[k], axes[k])
                } else {
                    frame_rotation(angles[k], axes[k])
                }
            })
            .collect();
        let d_matrix = self.constant_rotation.matrix() * factors[2] * factors[1] * factors[0];
        Ok(d_matrix * v * d_angle)
    }

    /// [`euler::wrap_angle`] exposed for raw per-time angle lookups.
    pub fn wrap_angle(reference: Radian, angle: Radian) -> Radian {
        euler::wrap_angle(reference, angle)
    }
}
