//! Euler-angle composition, decomposition and branch-cut handling.
//!
//! Conventions
//! -----------------
//! Elementary rotations are **frame** rotations: `[θ]ₖ` re-expresses a vector in a
//! frame rotated by `θ` about axis `k`, e.g.
//!
//! ```text
//!         | cos θ   sin θ   0 |
//! [θ]₃ =  |-sin θ   cos θ   0 |
//!         |   0       0     1 |
//! ```
//!
//! An Euler triple `(θ₁, θ₂, θ₃)` about axes `(a₁, a₂, a₃)` stands for
//!
//! ```text
//! R = [θ₃]a₃ · [θ₂]a₂ · [θ₁]a₁
//! ```
//!
//! so `θ₁` is applied first. Decomposition returns `θ₁, θ₃ ∈ (−π, π]` and, for a
//! repeated-axis sequence (`a₁ == a₃`), `θ₂ ∈ [0, π]`; for three distinct axes,
//! `θ₂ ∈ [−π/2, π/2]`. At gimbal lock `θ₃` is set to zero.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{Radian, DEFAULT_EULER_AXES, DPI, GIMBAL_LOCK_EPS};
use crate::kinematic_errors::KinematicError;

/// Principal axis of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Zero-based component index.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Next axis in the cyclic order X → Y → Z → X.
    pub fn next(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }

    pub fn unit(self) -> Unit<Vector3<f64>> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }

    fn from_index(index: usize) -> Axis {
        match index {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }
}

impl TryFrom<i32> for Axis {
    type Error = KinematicError;

    /// Axes are numbered 1 (X), 2 (Y), 3 (Z).
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Axis::X),
            2 => Ok(Axis::Y),
            3 => Ok(Axis::Z),
            other => Err(KinematicError::InvalidAxis(other)),
        }
    }
}

/// Axis sequence of an Euler triple, `axis1` being applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EulerAxes {
    pub axis1: Axis,
    pub axis2: Axis,
    pub axis3: Axis,
}

impl EulerAxes {
    /// Build a sequence from 1-based axis numbers.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::InvalidAxis`] for a number outside `{1, 2, 3}`.
    /// * [`KinematicError::InvalidAxisSequence`] if `axis2` equals `axis1` or `axis3`.
    pub fn new(axis1: i32, axis2: i32, axis3: i32) -> Result<Self, KinematicError> {
        let axes = EulerAxes {
            axis1: axis1.try_into()?,
            axis2: axis2.try_into()?,
            axis3: axis3.try_into()?,
        };
        if axes.axis2 == axes.axis1 || axes.axis2 == axes.axis3 {
            return Err(KinematicError::InvalidAxisSequence(axis1, axis2, axis3));
        }
        Ok(axes)
    }

    pub fn as_array(&self) -> [Axis; 3] {
        [self.axis1, self.axis2, self.axis3]
    }
}

impl Default for EulerAxes {
    fn default() -> Self {
        let (a1, a2, a3) = DEFAULT_EULER_AXES;
        EulerAxes {
            axis1: Axis::from_index(a1 as usize - 1),
            axis2: Axis::from_index(a2 as usize - 1),
            axis3: Axis::from_index(a3 as usize - 1),
        }
    }
}

/// Which angle of an Euler triple a partial derivative is taken against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EulerAngle {
    Angle1,
    Angle2,
    Angle3,
}

impl EulerAngle {
    pub fn index(self) -> usize {
        match self {
            EulerAngle::Angle1 => 0,
            EulerAngle::Angle2 => 1,
            EulerAngle::Angle3 => 2,
        }
    }
}

/// Frame rotation `[angle]axis`.
pub fn frame_rotation(angle: Radian, axis: Axis) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&axis.unit(), -angle).into_inner()
}

/// Derivative of [`frame_rotation`] with respect to `angle`.
pub fn frame_rotation_derivative(angle: Radian, axis: Axis) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    let j = axis.next().index();
    let k = axis.next().next().index();

    let mut d = Matrix3::zeros();
    d[(j, j)] = -s;
    d[(k, k)] = -s;
    d[(j, k)] = c;
    d[(k, j)] = -c;
    d
}

/// Compose `[θ₃]a₃ · [θ₂]a₂ · [θ₁]a₁` from `angles = [θ₁, θ₂, θ₃]`.
pub fn euler_to_rotation(angles: [Radian; 3], axes: &EulerAxes) -> Rotation3<f64> {
    let m = frame_rotation(angles[2], axes.axis3)
        * frame_rotation(angles[1], axes.axis2)
        * frame_rotation(angles[0], axes.axis1);
    Rotation3::from_matrix_unchecked(m)
}

/// Normalize an angle to `(−π, π]`.
fn principal(angle: Radian) -> Radian {
    let a = (angle + PI).rem_euclid(DPI) - PI;
    if a == -PI {
        PI
    } else {
        a
    }
}

/// Decompose `rotation` into `[θ₁, θ₂, θ₃]` about `axes`.
///
/// The matrix is relabeled so that the sequence becomes X-Y-X (repeated axis) or
/// X-Y-Z (distinct axes); an odd relabeling flips the sign of every angle.
pub fn rotation_to_euler(rotation: &Rotation3<f64>, axes: &EulerAxes) -> [Radian; 3] {
    let m = rotation.matrix();
    let [a1, a2, a3] = axes.as_array();

    if a1 == a3 {
        let third = Axis::from_index(3 - a1.index() - a2.index());
        let idx = [a1.index(), a2.index(), third.index()];
        let p = |r: usize, c: usize| m[(idx[r], idx[c])];
        let sign = if a2 == a1.next() { 1.0 } else { -1.0 };

        let sin2 = p(0, 1).hypot(p(0, 2));
        let theta2 = sin2.atan2(p(0, 0));
        let (theta1, theta3) = if sin2 > GIMBAL_LOCK_EPS {
            (p(0, 1).atan2(-p(0, 2)), p(1, 0).atan2(p(2, 0)))
        } else {
            (p(1, 2).atan2(p(1, 1)), 0.0)
        };

        let (t1, t2, t3) = (sign * theta1, sign * theta2, sign * theta3);
        if t2 < 0.0 {
            // [θ₃]ᵢ[θ₂]ⱼ[θ₁]ᵢ == [θ₃+π]ᵢ[−θ₂]ⱼ[θ₁+π]ᵢ keeps θ₂ in [0, π]
            [principal(t1 + PI), -t2, principal(t3 + PI)]
        } else {
            [principal(t1), t2, principal(t3)]
        }
    } else {
        let idx = [a3.index(), a2.index(), a1.index()];
        let p = |r: usize, c: usize| m[(idx[r], idx[c])];
        let sign = if a2 == a3.next() { 1.0 } else { -1.0 };

        let cos2 = p(0, 0).hypot(p(0, 1));
        let theta2 = (-p(0, 2)).atan2(cos2);
        let (theta1, theta3) = if cos2 > GIMBAL_LOCK_EPS {
            (p(0, 1).atan2(p(0, 0)), p(1, 2).atan2(p(2, 2)))
        } else {
            ((-p(1, 0)).atan2(p(1, 1)), 0.0)
        };

        [
            principal(sign * theta1),
            sign * theta2,
            principal(sign * theta3),
        ]
    }
}

/// Move `angle` by ±2π so that it lies within π of `reference`.
///
/// Returns `angle`, `angle − 2π` or `angle + 2π`. Inputs more than 3π away from
/// `reference` are only moved by one turn.
pub fn wrap_angle(reference: Radian, angle: Radian) -> Radian {
    let diff = reference - angle;
    if diff < -PI {
        angle - DPI
    } else if diff > PI {
        angle + DPI
    } else {
        angle
    }
}

#[cfg(test)]
mod euler_test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::constants::RADEG;

    fn all_sequences() -> Vec<EulerAxes> {
        let mut sequences = Vec::new();
        for a1 in 1..=3 {
            for a2 in 1..=3 {
                for a3 in 1..=3 {
                    if let Ok(axes) = EulerAxes::new(a1, a2, a3) {
                        sequences.push(axes);
                    }
                }
            }
        }
        sequences
    }

    #[test]
    fn test_axis_validation() {
        assert_eq!(Axis::try_from(0), Err(KinematicError::InvalidAxis(0)));
        assert_eq!(Axis::try_from(4), Err(KinematicError::InvalidAxis(4)));
        assert_eq!(
            EulerAxes::new(3, 3, 1),
            Err(KinematicError::InvalidAxisSequence(3, 3, 1))
        );
        assert_eq!(all_sequences().len(), 12);
        assert_eq!(
            EulerAxes::default(),
            EulerAxes::new(3, 1, 3).unwrap()
        );
    }

    #[test]
    fn test_frame_rotation_z() {
        let m = frame_rotation(30.0 * RADEG, Axis::Z);
        let (s, c) = (30.0 * RADEG).sin_cos();
        assert_relative_eq!(
            m,
            Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_frame_rotation_derivative_matches_finite_difference() {
        let h = 1e-7;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let angle = 0.7;
            let numeric =
                (frame_rotation(angle + h, axis) - frame_rotation(angle - h, axis)) / (2.0 * h);
            assert_relative_eq!(frame_rotation_derivative(angle, axis), numeric, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_decomposition_round_trip_all_sequences() {
        let angles = [0.4, 1.1, -2.3];
        for axes in all_sequences() {
            let r = euler_to_rotation(angles, &axes);
            let decomposed = rotation_to_euler(&r, &axes);
            assert_relative_eq!(euler_to_rotation(decomposed, &axes), r, epsilon = 1e-12);
            // Angles inside the principal ranges come back unchanged.
            for i in 0..3 {
                assert_relative_eq!(decomposed[i], angles[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_decomposition_ranges() {
        let r = Rotation3::from_euler_angles(2.9, -1.2, 0.3);
        for axes in all_sequences() {
            let [t1, t2, t3] = rotation_to_euler(&r, &axes);
            assert!(t1 > -PI && t1 <= PI);
            assert!(t3 > -PI && t3 <= PI);
            if axes.axis1 == axes.axis3 {
                assert!((0.0..=PI).contains(&t2));
            } else {
                assert!(t2.abs() <= PI / 2.0 + 1e-15);
            }
            assert_relative_eq!(euler_to_rotation([t1, t2, t3], &axes), r, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gimbal_lock() {
        let axes = EulerAxes::new(3, 1, 3).unwrap();
        let r = euler_to_rotation([0.5, 0.0, 0.25], &axes);
        let [t1, t2, t3] = rotation_to_euler(&r, &axes);
        assert_eq!(t3, 0.0);
        assert_relative_eq!(t2, 0.0, epsilon = 1e-15);
        assert_relative_eq!(t1, 0.75, epsilon = 1e-12);

        let identity = rotation_to_euler(&Rotation3::identity(), &axes);
        assert_eq!(identity, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wrap_angle() {
        let reference = 179.0 * RADEG;
        assert_relative_eq!(wrap_angle(reference, -179.0 * RADEG), 181.0 * RADEG);
        assert_eq!(wrap_angle(reference, 178.0 * RADEG), 178.0 * RADEG);
        assert_relative_eq!(wrap_angle(-reference, 179.0 * RADEG), -181.0 * RADEG);
    }

    #[test]
    fn test_wrap_angle_idempotent() {
        for reference in [-3.0, -1.0, 0.0, 0.5, 3.1] {
            for angle in [-PI, -2.0, -0.1, 0.0, 1.5, PI] {
                let wrapped = wrap_angle(reference, angle);
                assert!((wrapped - reference).abs() <= PI);
                assert_eq!(wrap_angle(reference, wrapped), wrapped);
            }
        }
    }
}
