//! # Constants and type definitions for kinecache
//!
//! This module centralizes the **numerical constants**, **default model settings**,
//! and **type aliases** shared by the orientation and position models.
//!
//! ## Overview
//!
//! - Angular constants used by the Euler-angle branch-cut handling
//! - Defaults applied when a model is constructed without explicit [`ModelParams`](crate::params::ModelParams)
//! - Field layouts of the persisted cache tables
//! - Type aliases documenting the unit carried by a plain `f64`

// -------------------------------------------------------------------------------------------------
// Angular constants
// -------------------------------------------------------------------------------------------------

/// 2π, the period of every Euler angle channel
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Model defaults
// -------------------------------------------------------------------------------------------------

/// Polynomial degree used by [`set_polynomial`](crate::rotation::OrientationModel::set_polynomial)
/// and [`set_polynomial`](crate::position::PositionModel::set_polynomial) when none was requested.
pub const DEFAULT_POLYNOMIAL_DEGREE: usize = 2;

/// Default Euler axis sequence of the orientation fit (Z, X, Z).
pub const DEFAULT_EULER_AXES: (i32, i32, i32) = (3, 1, 3);

/// Singular values below this threshold are treated as zero by the SVD solver.
pub const DEFAULT_SVD_TOLERANCE: f64 = 1e-12;

/// Below this value `sin`/`cos` of the middle Euler angle is treated as zero (gimbal lock).
pub const GIMBAL_LOCK_EPS: f64 = 1e-14;

// -------------------------------------------------------------------------------------------------
// Persisted cache layouts
// -------------------------------------------------------------------------------------------------

/// Field names of an orientation table: unit quaternion (scalar first) and time.
pub const ROTATION_TABLE_FIELDS: [&str; 5] = ["J2000Q0", "J2000Q1", "J2000Q2", "J2000Q3", "ET"];

/// Field names of a position-only table.
pub const POSITION_TABLE_FIELDS: [&str; 4] = ["J2000X", "J2000Y", "J2000Z", "ET"];

/// Field names of a position + velocity table.
pub const STATE_TABLE_FIELDS: [&str; 7] = [
    "J2000X", "J2000Y", "J2000Z", "J2000XV", "J2000YV", "J2000ZV", "ET",
];

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Ephemeris time, seconds past J2000 TDB
pub type EphemerisTime = f64;

/// Angle in radians
pub type Radian = f64;

/// NAIF integer code of a body (spacecraft, planet, barycenter)
pub type BodyCode = i32;

/// NAIF integer code of a reference frame
pub type FrameCode = i32;

/// NAIF code of the J2000 inertial frame
pub const J2000: FrameCode = 1;
