use thiserror::Error;

use crate::constants::{BodyCode, EphemerisTime, FrameCode};

/// Failures reported by an external ephemeris or orientation source.
///
/// Two families are distinguished so the caller can decide on a retry/skip
/// policy: configuration errors (the frame or body is not known to the source
/// at all) and data gaps (the source knows the frame but has no coverage at
/// the requested instant).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Unknown reference frame {frame}")]
    UnknownFrame { frame: FrameCode },

    #[error("Unknown body {body}")]
    UnknownBody { body: BodyCode },

    #[error("No coverage for frame {frame} at et = {et}")]
    NoCoverage { frame: FrameCode, et: EphemerisTime },
}

impl SourceError {
    /// `true` for the "frame/body unknown" family.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SourceError::UnknownFrame { .. } | SourceError::UnknownBody { .. }
        )
    }

    /// `true` for the "no data at this instant" family.
    pub fn is_data_gap(&self) -> bool {
        matches!(self, SourceError::NoCoverage { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicError {
    #[error("Ephemeris source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cache is already loaded; a cache can only be loaded once")]
    CacheAlreadyLoaded,

    #[error("Cache is not loaded")]
    CacheNotLoaded,

    #[error("Model has no source to load a cache from")]
    NoSource,

    #[error("Non monotonic cache time: {next} does not follow {previous}")]
    NonMonotonicTime {
        previous: EphemerisTime,
        next: EphemerisTime,
    },

    #[error("Invalid cache time range: start = {start}, end = {end}, count = {count}")]
    InvalidTimeRange {
        start: EphemerisTime,
        end: EphemerisTime,
        count: usize,
    },

    #[error("Time {et} is outside the cached range [{start}, {end}]")]
    OutsideCacheRange {
        et: EphemerisTime,
        start: EphemerisTime,
        end: EphemerisTime,
    },

    #[error("Invalid rotation axis {0} (must be 1, 2 or 3)")]
    InvalidAxis(i32),

    #[error("Invalid Euler axis sequence ({0}, {1}, {2}): the middle axis must differ from its neighbours")]
    InvalidAxisSequence(i32, i32, i32),

    #[error("Euler axes cannot be changed once a polynomial has been fit")]
    AxesLockedByFit,

    #[error("No polynomial has been fit")]
    PolynomialNotFitted,

    #[error("Coefficient index {index} is out of range for a polynomial of degree {degree}")]
    CoefficientIndexOutOfRange { index: usize, degree: usize },

    #[error("Coefficient channels have inconsistent lengths: {0:?}")]
    InconsistentCoefficients([usize; 3]),

    #[error("Invalid field count {found} for table {table} (expected {expected})")]
    InvalidTableFieldCount {
        table: String,
        expected: &'static str,
        found: usize,
    },

    #[error("Record {record} of table {table} has {found} values (expected {expected})")]
    InvalidTableRecord {
        table: String,
        record: usize,
        expected: usize,
        found: usize,
    },

    #[error("Quaternion of record {0} has zero norm")]
    DegenerateQuaternion(usize),

    #[error("Basis expects {expected} input variables, got {found}")]
    InvalidInputDimension { expected: usize, found: usize },

    #[error("Least squares problem is underdetermined: {knowns} knowns for {unknowns} unknowns")]
    UnderdeterminedSystem { knowns: usize, unknowns: usize },

    #[error("Least squares solve failed: {0}")]
    SingularSystem(String),

    #[error("Least squares solution requested before solve")]
    NotSolved,

    #[error("Invalid least squares weight {0} (must be > 0)")]
    InvalidWeight(f64),

    #[error("Source returned no velocity at et = {0}")]
    MissingVelocity(EphemerisTime),

    #[error("Nadir frame is undefined at et = {0}: position and velocity are parallel")]
    DegenerateNadirGeometry(EphemerisTime),

    #[error("Invalid model parameters: {0}")]
    InvalidModelParams(String),
}
