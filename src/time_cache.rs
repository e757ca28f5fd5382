//! # Time-indexed sample cache
//!
//! [`TimeSeriesCache`] stores kinematic samples in strictly increasing
//! ephemeris-time order and answers point queries by interpolating the bracketing
//! pair of samples.
//!
//! Lookup rules
//! -----------------
//! * One sample: returned unconditionally, whatever the query time.
//! * Otherwise the first sample with a time **greater** than the query is located
//!   by binary search and the interval ending there is interpolated. Queries past
//!   the last sample use the last interval, queries before the first sample use the
//!   first one, so the cache extrapolates linearly unless the
//!   [`ExtrapolationPolicy`] says otherwise.
//! * `mult = (t − tᵢ) / (tᵢ₊₁ − tᵢ)` drives the [`Interpolate`] implementation of the
//!   sample type.
//!
//! Sample types
//! -----------------
//! * `Vector3<f64>` – component-wise linear interpolation.
//! * [`PositionState`] – linear interpolation of position, and of velocity when both
//!   samples carry one.
//! * `Rotation3<f64>` – axis-angle scaling of the relative rotation between the two
//!   samples: `R(t) = Rᵢ · exp(mult · log(Rᵢᵀ · Rᵢ₊₁))`, exact at both ends.

use hifitime::Epoch;
use nalgebra::{Rotation3, Vector3};

use crate::constants::EphemerisTime;
use crate::kinematic_errors::KinematicError;
use crate::params::ExtrapolationPolicy;

/// Linear blending of two samples, `mult = 0` giving `self` and `mult = 1` giving `next`.
pub trait Interpolate: Clone {
    fn interpolate(&self, next: &Self, mult: f64) -> Self;
}

impl Interpolate for Vector3<f64> {
    fn interpolate(&self, next: &Self, mult: f64) -> Self {
        self + (next - self) * mult
    }
}

impl Interpolate for Rotation3<f64> {
    fn interpolate(&self, next: &Self, mult: f64) -> Self {
        let delta = self.transpose() * next;
        match delta.axis_angle() {
            Some((axis, angle)) => self * Rotation3::from_axis_angle(&axis, angle * mult),
            None => *self,
        }
    }
}

/// Position (km) with an optional velocity (km/s).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub position: Vector3<f64>,
    pub velocity: Option<Vector3<f64>>,
}

impl PositionState {
    pub fn new(position: Vector3<f64>, velocity: Option<Vector3<f64>>) -> Self {
        PositionState { position, velocity }
    }
}

impl Default for PositionState {
    fn default() -> Self {
        PositionState {
            position: Vector3::zeros(),
            velocity: None,
        }
    }
}

impl Interpolate for PositionState {
    /// Velocity is interpolated only when present on both samples; otherwise it is dropped.
    fn interpolate(&self, next: &Self, mult: f64) -> Self {
        PositionState {
            position: self.position.interpolate(&next.position, mult),
            velocity: match (&self.velocity, &next.velocity) {
                (Some(v1), Some(v2)) => Some(v1.interpolate(v2, mult)),
                _ => None,
            },
        }
    }
}

/// One cached sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSample<T> {
    pub et: EphemerisTime,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesCache<T> {
    samples: Vec<TimeSample<T>>,
    extrapolation: ExtrapolationPolicy,
}

impl<T> Default for TimeSeriesCache<T> {
    fn default() -> Self {
        TimeSeriesCache {
            samples: Vec::new(),
            extrapolation: ExtrapolationPolicy::default(),
        }
    }
}

impl<T: Interpolate> TimeSeriesCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extrapolation(mut self, policy: ExtrapolationPolicy) -> Self {
        self.extrapolation = policy;
        self
    }

    pub fn set_extrapolation(&mut self, policy: ExtrapolationPolicy) {
        self.extrapolation = policy;
    }

    pub fn extrapolation(&self) -> ExtrapolationPolicy {
        self.extrapolation
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TimeSample<T>] {
        &self.samples
    }

    pub fn times(&self) -> impl Iterator<Item = EphemerisTime> + '_ {
        self.samples.iter().map(|s| s.et)
    }

    /// Time span `(first, last)` of the cache, `None` when empty.
    pub fn time_range(&self) -> Option<(EphemerisTime, EphemerisTime)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.et, last.et)),
            _ => None,
        }
    }

    /// Append a sample after the current last one.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::NonMonotonicTime`] if `et` is not strictly greater than the
    ///   time of the last sample.
    pub fn append(&mut self, et: EphemerisTime, value: T) -> Result<(), KinematicError> {
        if let Some(last) = self.samples.last() {
            if !(et > last.et) {
                return Err(KinematicError::NonMonotonicTime {
                    previous: last.et,
                    next: et,
                });
            }
        }
        self.samples.push(TimeSample { et, value });
        Ok(())
    }

    /// Value of the cache at `et`, see the module documentation for the lookup rules.
    pub fn evaluate(&self, et: EphemerisTime) -> Result<T, KinematicError> {
        match self.samples.as_slice() {
            [] => Err(KinematicError::CacheNotLoaded),
            [only] => Ok(only.value.clone()),
            samples => {
                let n = samples.len();
                let (start, end) = (samples[0].et, samples[n - 1].et);
                if self.extrapolation == ExtrapolationPolicy::Reject && !(start..=end).contains(&et)
                {
                    return Err(KinematicError::OutsideCacheRange { et, start, end });
                }

                let upper = samples.partition_point(|s| s.et <= et);
                let index = upper.saturating_sub(1).min(n - 2);
                let (lo, hi) = (&samples[index], &samples[index + 1]);
                let mult = (et - lo.et) / (hi.et - lo.et);
                Ok(lo.value.interpolate(&hi.value, mult))
            }
        }
    }

    /// Replace every sample value by `f(et)`, keeping the original timestamps.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::CacheNotLoaded`] on an empty cache.
    /// * The first error returned by `f`; the cache is left untouched in that case.
    pub fn reload<F>(&mut self, mut f: F) -> Result<(), KinematicError>
    where
        F: FnMut(EphemerisTime) -> Result<T, KinematicError>,
    {
        if self.samples.is_empty() {
            return Err(KinematicError::CacheNotLoaded);
        }
        let reloaded = self
            .samples
            .iter()
            .map(|s| {
                Ok(TimeSample {
                    et: s.et,
                    value: f(s.et)?,
                })
            })
            .collect::<Result<Vec<_>, KinematicError>>()?;
        self.samples = reloaded;
        Ok(())
    }
}

/// Evenly spaced cache times from `start` to `end` inclusive.
///
/// Errors
/// ----------
/// * [`KinematicError::InvalidTimeRange`] if `start > end`, `count == 0`, or
///   `start == end` with `count != 1`.
///
/// A single-point grid is `[start]`.
pub fn time_grid(
    start: EphemerisTime,
    end: EphemerisTime,
    count: usize,
) -> Result<Vec<EphemerisTime>, KinematicError> {
    let invalid = || KinematicError::InvalidTimeRange { start, end, count };
    if !(start <= end) || count == 0 || (start == end && count != 1) {
        return Err(invalid());
    }
    if count == 1 {
        return Ok(vec![start]);
    }

    let step = (end - start) / (count - 1) as f64;
    let mut times: Vec<f64> = (0..count - 1).map(|i| start + i as f64 * step).collect();
    times.push(end);
    Ok(times)
}

/// [`time_grid`] over two [`Epoch`]s, converted to ephemeris seconds.
pub fn time_grid_epochs(
    start: &Epoch,
    end: &Epoch,
    count: usize,
) -> Result<Vec<EphemerisTime>, KinematicError> {
    time_grid(start.to_et_seconds(), end.to_et_seconds(), count)
}

#[cfg(test)]
mod time_cache_test {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use hifitime::Duration;

    use super::*;

    fn line_cache() -> TimeSeriesCache<Vector3<f64>> {
        let mut cache = TimeSeriesCache::new();
        cache.append(0.0, Vector3::new(0.0, 0.0, 0.0)).unwrap();
        cache.append(10.0, Vector3::new(10.0, 0.0, 0.0)).unwrap();
        cache
    }

    #[test]
    fn test_vector_interpolation_and_extrapolation() {
        let cache = line_cache();
        assert_eq!(cache.evaluate(0.0).unwrap(), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(cache.evaluate(10.0).unwrap(), Vector3::new(10.0, 0.0, 0.0));
        assert_eq!(cache.evaluate(5.0).unwrap(), Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(cache.evaluate(20.0).unwrap(), Vector3::new(20.0, 0.0, 0.0));
        assert_eq!(cache.evaluate(-5.0).unwrap(), Vector3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn test_reject_extrapolation() {
        let cache = line_cache().with_extrapolation(ExtrapolationPolicy::Reject);
        assert_eq!(cache.evaluate(10.0).unwrap(), Vector3::new(10.0, 0.0, 0.0));
        assert_eq!(
            cache.evaluate(20.0),
            Err(KinematicError::OutsideCacheRange {
                et: 20.0,
                start: 0.0,
                end: 10.0
            })
        );
    }

    #[test]
    fn test_interior_interval_selection() {
        let mut cache = TimeSeriesCache::new();
        for (et, x) in [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)] {
            cache.append(et, Vector3::new(x, 0.0, 0.0)).unwrap();
        }
        assert_eq!(cache.evaluate(1.5).unwrap().x, 2.5);
        assert_eq!(cache.evaluate(2.0).unwrap().x, 4.0);
        // last interval slope is 5
        assert_eq!(cache.evaluate(4.0).unwrap().x, 14.0);
        // first interval slope is 1
        assert_eq!(cache.evaluate(-1.0).unwrap().x, -1.0);
    }

    #[test]
    fn test_single_sample_is_returned_everywhere() {
        let mut cache = TimeSeriesCache::new().with_extrapolation(ExtrapolationPolicy::Reject);
        cache.append(3.0, Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(cache.evaluate(-100.0).unwrap(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(cache.evaluate(1e9).unwrap(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_empty_and_non_monotonic() {
        let mut cache: TimeSeriesCache<Vector3<f64>> = TimeSeriesCache::new();
        assert_eq!(cache.evaluate(0.0), Err(KinematicError::CacheNotLoaded));
        cache.append(1.0, Vector3::zeros()).unwrap();
        assert_eq!(
            cache.append(1.0, Vector3::zeros()),
            Err(KinematicError::NonMonotonicTime {
                previous: 1.0,
                next: 1.0
            })
        );
        assert!(cache.append(0.5, Vector3::zeros()).is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rotation_interpolation() {
        let r0 = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.0);
        let r1 = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mut cache = TimeSeriesCache::new();
        cache.append(0.0, r0).unwrap();
        cache.append(2.0, r1).unwrap();

        assert_relative_eq!(cache.evaluate(0.0).unwrap(), r0, epsilon = 1e-12);
        assert_relative_eq!(cache.evaluate(2.0).unwrap(), r1, epsilon = 1e-12);

        let half = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2 / 2.0);
        assert_relative_eq!(cache.evaluate(1.0).unwrap(), half, epsilon = 1e-12);

        let beyond = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2 * 1.5);
        assert_relative_eq!(cache.evaluate(3.0).unwrap(), beyond, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_interpolation_off_axis() {
        let r0 = Rotation3::from_euler_angles(0.1, -0.4, 1.2);
        let r1 = Rotation3::from_euler_angles(0.3, -0.2, 1.0);
        let mut cache = TimeSeriesCache::new();
        cache.append(10.0, r0).unwrap();
        cache.append(11.0, r1).unwrap();
        assert_relative_eq!(cache.evaluate(11.0).unwrap(), r1, epsilon = 1e-12);

        // Half way is the rotation that composes with itself to the full delta.
        let mid = cache.evaluate(10.5).unwrap();
        let half_delta = r0.transpose() * mid;
        assert_relative_eq!(half_delta * half_delta, r0.transpose() * r1, epsilon = 1e-12);
    }

    #[test]
    fn test_position_state_velocity_propagation() {
        let mut cache = TimeSeriesCache::new();
        cache
            .append(
                0.0,
                PositionState::new(Vector3::zeros(), Some(Vector3::new(1.0, 0.0, 0.0))),
            )
            .unwrap();
        cache
            .append(
                2.0,
                PositionState::new(Vector3::new(2.0, 0.0, 0.0), Some(Vector3::new(3.0, 0.0, 0.0))),
            )
            .unwrap();
        let state = cache.evaluate(1.0).unwrap();
        assert_eq!(state.position, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(state.velocity, Some(Vector3::new(2.0, 0.0, 0.0)));

        let partial = PositionState::new(Vector3::zeros(), None)
            .interpolate(&PositionState::new(Vector3::zeros(), Some(Vector3::zeros())), 0.5);
        assert!(partial.velocity.is_none());
    }

    #[test]
    fn test_reload_keeps_timestamps() {
        let mut cache = line_cache();
        cache.reload(|et| Ok(Vector3::new(0.0, et, 0.0))).unwrap();
        assert_eq!(cache.times().collect::<Vec<_>>(), vec![0.0, 10.0]);
        assert_eq!(cache.evaluate(5.0).unwrap(), Vector3::new(0.0, 5.0, 0.0));

        let failed = cache.reload(|_| Err(KinematicError::NoSource));
        assert_eq!(failed, Err(KinematicError::NoSource));
        assert_eq!(cache.evaluate(10.0).unwrap(), Vector3::new(0.0, 10.0, 0.0));

        let mut empty: TimeSeriesCache<Vector3<f64>> = TimeSeriesCache::new();
        assert_eq!(
            empty.reload(|_| Ok(Vector3::zeros())),
            Err(KinematicError::CacheNotLoaded)
        );
    }

    #[test]
    fn test_time_grid() {
        assert_eq!(time_grid(0.0, 10.0, 3).unwrap(), vec![0.0, 5.0, 10.0]);
        assert_eq!(time_grid(4.0, 4.0, 1).unwrap(), vec![4.0]);
        assert!(time_grid(4.0, 4.0, 2).is_err());
        assert!(time_grid(5.0, 4.0, 2).is_err());
        assert!(time_grid(0.0, 4.0, 0).is_err());
        assert_eq!(time_grid(0.0, 4.0, 1).unwrap(), vec![0.0]);

        let grid = time_grid(0.1, 0.7, 7).unwrap();
        assert_eq!(grid.len(), 7);
        assert_eq!(*grid.last().unwrap(), 0.7);
    }

    #[test]
    fn test_time_grid_epochs() {
        let start = Epoch::from_et_seconds(1000.0);
        let end = start + Duration::from_seconds(20.0);
        let grid = time_grid_epochs(&start, &end, 5).unwrap();
        assert_relative_eq!(grid[0], 1000.0, epsilon = 1e-6);
        assert_relative_eq!(grid[4], 1020.0, epsilon = 1e-6);
    }
}
