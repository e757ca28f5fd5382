//! # External ephemeris and orientation sources
//!
//! The kinematic models never read kernels themselves. They are handed a source
//! capability at construction and call it synchronously whenever they need a raw
//! sample (direct queries, cache loading, nadir pointing):
//!
//! * [`PositionSource`] – state of a target body relative to an observer body.
//! * [`OrientationSource`] – rotation from one reference frame to another.
//!
//! Both report failures as [`SourceError`], which separates configuration errors
//! (unknown frame or body) from data gaps (no coverage at the requested time).
//! Callers own the lifecycle of the source; the models only keep an [`Arc`](std::sync::Arc) to it.

use std::fmt;

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{BodyCode, EphemerisTime, FrameCode};
use crate::kinematic_errors::SourceError;
use crate::time_cache::PositionState;

/// Aberration correction requested from a position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AberrationCorrection {
    #[default]
    None,
    /// One-way light time
    LightTime,
    /// Light time and stellar aberration
    LightTimeStellar,
    /// Converged Newtonian light time
    Converged,
    /// Converged Newtonian light time and stellar aberration
    ConvergedStellar,
}

impl AberrationCorrection {
    /// NAIF spelling of the correction.
    pub fn as_str(&self) -> &'static str {
        match self {
            AberrationCorrection::None => "NONE",
            AberrationCorrection::LightTime => "LT",
            AberrationCorrection::LightTimeStellar => "LT+S",
            AberrationCorrection::Converged => "CN",
            AberrationCorrection::ConvergedStellar => "CN+S",
        }
    }
}

impl fmt::Display for AberrationCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of a [`PositionSource`] query.
///
/// Fields
/// -----------------
/// * `position` – target relative to observer (km).
/// * `velocity` – optional velocity (km/s).
/// * `light_time` – one-way light time between observer and target (s).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub position: Vector3<f64>,
    pub velocity: Option<Vector3<f64>>,
    pub light_time: f64,
}

impl SourceState {
    pub fn to_position_state(&self) -> PositionState {
        PositionState::new(self.position, self.velocity)
    }
}

pub trait PositionSource: fmt::Debug {
    /// State of `target` relative to `observer` at `et`, expressed in `frame`.
    fn state(
        &self,
        target: BodyCode,
        observer: BodyCode,
        et: EphemerisTime,
        frame: FrameCode,
        correction: AberrationCorrection,
    ) -> Result<SourceState, SourceError>;
}

pub trait OrientationSource: fmt::Debug {
    /// Rotation taking vectors expressed in `from_frame` to `to_frame` at `et`.
    fn orientation(
        &self,
        from_frame: FrameCode,
        to_frame: FrameCode,
        et: EphemerisTime,
    ) -> Result<Rotation3<f64>, SourceError>;
}
