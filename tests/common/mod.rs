#![allow(dead_code)]

use std::cell::Cell;

use approx::assert_relative_eq;
use nalgebra::{Rotation3, Vector3};

use kinecache::constants::{BodyCode, EphemerisTime, FrameCode, J2000};
use kinecache::ephemeris_source::{
    AberrationCorrection, OrientationSource, PositionSource, SourceState,
};
use kinecache::rotation::euler::{euler_to_rotation, EulerAxes};
use kinecache::SourceError;

pub const SPACECRAFT: BodyCode = -82;
pub const MARS: BodyCode = 499;
pub const INSTRUMENT_FRAME: FrameCode = -82360;

const LIGHT_SPEED_KM_S: f64 = 299_792.458;

/// Orientation source whose 3-1-3 Euler angles are quadratics in time.
#[derive(Debug)]
pub struct SpinningSource {
    /// `angle_k(t) = c[k][0] + c[k][1]·t + c[k][2]·t²`
    pub coefficients: [[f64; 3]; 3],
    pub coverage: (EphemerisTime, EphemerisTime),
    pub queries: Cell<usize>,
}

impl SpinningSource {
    pub fn new(coverage: (EphemerisTime, EphemerisTime)) -> Self {
        SpinningSource {
            coefficients: [[0.3, 0.05, 0.001], [0.6, -0.01, 0.0005], [-1.2, 0.02, -0.002]],
            coverage,
            queries: Cell::new(0),
        }
    }

    pub fn angles(&self, et: EphemerisTime) -> [f64; 3] {
        self.coefficients
            .map(|c| c[0] + c[1] * et + c[2] * et * et)
    }

    pub fn rotation(&self, et: EphemerisTime) -> Rotation3<f64> {
        euler_to_rotation(self.angles(et), &EulerAxes::default())
    }
}

impl OrientationSource for SpinningSource {
    fn orientation(
        &self,
        from_frame: FrameCode,
        to_frame: FrameCode,
        et: EphemerisTime,
    ) -> Result<Rotation3<f64>, SourceError> {
        self.queries.set(self.queries.get() + 1);
        for frame in [from_frame, to_frame] {
            if frame != J2000 && frame != INSTRUMENT_FRAME {
                return Err(SourceError::UnknownFrame { frame });
            }
        }
        if et < self.coverage.0 || et > self.coverage.1 {
            return Err(SourceError::NoCoverage { frame: to_frame, et });
        }
        Ok(self.rotation(et))
    }
}

/// Spacecraft on a circular equatorial orbit around Mars.
#[derive(Debug)]
pub struct OrbitSource {
    pub radius: f64,
    /// rad/s
    pub rate: f64,
    pub with_velocity: bool,
}

impl OrbitSource {
    pub fn new() -> Self {
        OrbitSource {
            radius: 3800.0,
            rate: 1e-3,
            with_velocity: true,
        }
    }

    pub fn position(&self, et: EphemerisTime) -> Vector3<f64> {
        let (s, c) = (self.rate * et).sin_cos();
        Vector3::new(self.radius * c, self.radius * s, 0.0)
    }

    pub fn velocity(&self, et: EphemerisTime) -> Vector3<f64> {
        let (s, c) = (self.rate * et).sin_cos();
        self.radius * self.rate * Vector3::new(-s, c, 0.0)
    }
}

impl PositionSource for OrbitSource {
    fn state(
        &self,
        target: BodyCode,
        observer: BodyCode,
        et: EphemerisTime,
        _frame: FrameCode,
        _correction: AberrationCorrection,
    ) -> Result<SourceState, SourceError> {
        for body in [target, observer] {
            if body != SPACECRAFT && body != MARS {
                return Err(SourceError::UnknownBody { body });
            }
        }
        let position = self.position(et);
        Ok(SourceState {
            position,
            velocity: self.with_velocity.then(|| self.velocity(et)),
            light_time: position.norm() / LIGHT_SPEED_KM_S,
        })
    }
}

/// Target moving along a quadratic: `p(t) = a + b·t + c·t²`.
#[derive(Debug)]
pub struct QuadraticSource {
    pub a: Vector3<f64>,
    pub b: Vector3<f64>,
    pub c: Vector3<f64>,
}

impl QuadraticSource {
    pub fn new() -> Self {
        QuadraticSource {
            a: Vector3::new(1000.0, -250.0, 40.0),
            b: Vector3::new(2.0, 0.5, -1.5),
            c: Vector3::new(0.01, -0.002, 0.0),
        }
    }

    pub fn position(&self, et: EphemerisTime) -> Vector3<f64> {
        self.a + self.b * et + self.c * et * et
    }

    pub fn velocity(&self, et: EphemerisTime) -> Vector3<f64> {
        self.b + self.c * (2.0 * et)
    }
}

impl PositionSource for QuadraticSource {
    fn state(
        &self,
        _target: BodyCode,
        _observer: BodyCode,
        et: EphemerisTime,
        _frame: FrameCode,
        _correction: AberrationCorrection,
    ) -> Result<SourceState, SourceError> {
        Ok(SourceState {
            position: self.position(et),
            velocity: Some(self.velocity(et)),
            light_time: 0.0,
        })
    }
}

pub fn assert_rotation_close(actual: &Rotation3<f64>, expected: &Rotation3<f64>, epsilon: f64) {
    assert_relative_eq!(*actual.matrix(), *expected.matrix(), epsilon = epsilon);
}

pub fn assert_records_close(actual: &[Vec<f64>], expected: &[Vec<f64>], epsilon: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_eq!(a.len(), e.len());
        for (x, y) in a.iter().zip(e) {
            assert_relative_eq!(*x, *y, epsilon = epsilon);
        }
    }
}
