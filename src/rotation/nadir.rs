//! Nadir pointing: an instrument frame built from the spacecraft state.
//!
//! One instrument axis points at the target body center and a second one lies
//! in the plane of that direction and the spacecraft velocity. The velocity axis
//! is mission configuration and is passed in explicitly through [`NadirGeometry`].

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::constants::{BodyCode, EphemerisTime, FrameCode, J2000};
use crate::ephemeris_source::{AberrationCorrection, PositionSource};
use crate::kinematic_errors::KinematicError;

use super::euler::Axis;

/// Bodies, frame and axes defining a nadir-pointed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NadirGeometry {
    pub spacecraft: BodyCode,
    pub target: BodyCode,
    pub frame: FrameCode,
    pub correction: AberrationCorrection,
    /// Instrument axis pointed at the target center.
    pub pointing_axis: Axis,
    /// Instrument axis kept on the velocity side of the pointing plane.
    pub velocity_axis: Axis,
}

impl NadirGeometry {
    /// Z toward the target, X along the velocity, J2000, light time + stellar aberration.
    pub fn new(spacecraft: BodyCode, target: BodyCode) -> Self {
        NadirGeometry {
            spacecraft,
            target,
            frame: J2000,
            correction: AberrationCorrection::LightTimeStellar,
            pointing_axis: Axis::Z,
            velocity_axis: Axis::X,
        }
    }

    pub fn with_axes(mut self, pointing_axis: Axis, velocity_axis: Axis) -> Self {
        self.pointing_axis = pointing_axis;
        self.velocity_axis = velocity_axis;
        self
    }

    /// Nadir rotation at `et` (already time-biased by the caller).
    pub(crate) fn rotation(
        &self,
        source: &dyn PositionSource,
        et: EphemerisTime,
    ) -> Result<Rotation3<f64>, KinematicError> {
        let state = source.state(self.spacecraft, self.target, et, self.frame, self.correction)?;
        let velocity = state.velocity.ok_or(KinematicError::MissingVelocity(et))?;
        // spacecraft → target center
        let look = -state.position;
        two_vector_frame(&look, self.pointing_axis, &velocity, self.velocity_axis)
            .ok_or(KinematicError::DegenerateNadirGeometry(et))
    }
}

/// Frame whose `primary_axis` is along `primary` and whose `secondary_axis` lies in
/// the `primary`/`secondary` plane, on the side of `secondary`.
///
/// The returned rotation maps reference-frame coordinates to the new frame: its rows
/// are the new basis vectors. `None` if the vectors are parallel, zero, or the two
/// axes coincide.
pub fn two_vector_frame(
    primary: &Vector3<f64>,
    primary_axis: Axis,
    secondary: &Vector3<f64>,
    secondary_axis: Axis,
) -> Option<Rotation3<f64>> {
    if primary_axis == secondary_axis {
        return None;
    }
    let e_primary = primary.try_normalize(f64::EPSILON)?;

    let (e_third, e_secondary) = if secondary_axis == primary_axis.next() {
        let e_third = e_primary.cross(secondary).try_normalize(f64::EPSILON)?;
        (e_third, e_third.cross(&e_primary))
    } else {
        let e_third = secondary.cross(&e_primary).try_normalize(f64::EPSILON)?;
        (e_third, e_primary.cross(&e_third))
    };

    let third_axis = primary_axis.next().next();
    let third_axis = if third_axis == secondary_axis {
        primary_axis.next()
    } else {
        third_axis
    };

    let mut m = Matrix3::zeros();
    m.set_row(primary_axis.index(), &e_primary.transpose());
    m.set_row(secondary_axis.index(), &e_secondary.transpose());
    m.set_row(third_axis.index(), &e_third.transpose());
    Some(Rotation3::from_matrix_unchecked(m))
}

#[cfg(test)]
mod nadir_test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_two_vector_frame_all_axis_pairs() {
        let primary = Vector3::new(1.0, 2.0, -0.5);
        let secondary = Vector3::new(-0.3, 0.4, 2.0);
        for pa in [Axis::X, Axis::Y, Axis::Z] {
            for sa in [Axis::X, Axis::Y, Axis::Z] {
                let frame = two_vector_frame(&primary, pa, &secondary, sa);
                if pa == sa {
                    assert!(frame.is_none());
                    continue;
                }
                let r = frame.unwrap();
                // proper rotation
                assert_relative_eq!(r.matrix().determinant(), 1.0, epsilon = 1e-12);
                assert_relative_eq!(
                    r.matrix() * r.matrix().transpose(),
                    Matrix3::identity(),
                    epsilon = 1e-12
                );
                // primary maps onto the primary axis
                let p = r * primary.normalize();
                assert_relative_eq!(p[pa.index()], 1.0, epsilon = 1e-12);
                // secondary stays in the plane, on the positive side
                let s = r * secondary;
                let third = 3 - pa.index() - sa.index();
                assert_relative_eq!(s[third], 0.0, epsilon = 1e-12);
                assert!(s[sa.index()] > 0.0);
            }
        }
    }

    #[test]
    fn test_parallel_vectors() {
        let v = Vector3::new(0.0, 0.0, 1.0);
        assert!(two_vector_frame(&v, Axis::Z, &(2.0 * v), Axis::X).is_none());
        assert!(two_vector_frame(&Vector3::zeros(), Axis::Z, &v, Axis::X).is_none());
    }
}
