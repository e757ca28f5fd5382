//! # Persisted cache tables
//!
//! A [`CacheTable`] is the in-memory form of a cache once it leaves the model:
//! one record per cached sample, in insertion order, with the ephemeris time as the
//! last field. The surrounding layer owns the on-disk format; this module only
//! converts between tables and cache samples and validates the layout.
//!
//! | kind        | fields                                              |
//! |-------------|-----------------------------------------------------|
//! | orientation | `J2000Q0 J2000Q1 J2000Q2 J2000Q3 ET`                 |
//! | position    | `J2000X J2000Y J2000Z ET`                            |
//! | state       | `J2000X J2000Y J2000Z J2000XV J2000YV J2000ZV ET`    |
//!
//! Orientation records store the unit quaternion `(w, x, y, z)` of the rotation,
//! with the sign chosen so that `w ≥ 0`.

use itertools::Itertools;
use nalgebra::{Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{
    EphemerisTime, POSITION_TABLE_FIELDS, ROTATION_TABLE_FIELDS, STATE_TABLE_FIELDS,
};
use crate::kinematic_errors::KinematicError;
use crate::time_cache::{PositionState, TimeSample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheTable {
    pub name: String,
    pub fields: Vec<String>,
    pub records: Vec<Vec<f64>>,
}

impl CacheTable {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        CacheTable {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Quaternion table of a rotation cache.
    pub fn from_rotations(name: impl Into<String>, samples: &[TimeSample<Rotation3<f64>>]) -> Self {
        let mut table = CacheTable::new(name, &ROTATION_TABLE_FIELDS);
        table.records = samples
            .iter()
            .map(|s| {
                let q = UnitQuaternion::from_rotation_matrix(&s.value);
                let sign = if q.w < 0.0 { -1.0 } else { 1.0 };
                vec![sign * q.w, sign * q.i, sign * q.j, sign * q.k, s.et]
            })
            .collect();
        table
    }

    /// Position table of a position cache.
    ///
    /// Velocities are written (7 fields) only if every sample carries one.
    pub fn from_positions(name: impl Into<String>, samples: &[TimeSample<PositionState>]) -> Self {
        let with_velocity = !samples.is_empty() && samples.iter().all(|s| s.value.velocity.is_some());
        let fields: &[&str] = if with_velocity {
            &STATE_TABLE_FIELDS
        } else {
            &POSITION_TABLE_FIELDS
        };
        let mut table = CacheTable::new(name, fields);
        table.records = samples
            .iter()
            .map(|s| {
                let p = &s.value.position;
                let mut record = vec![p.x, p.y, p.z];
                if let (true, Some(v)) = (with_velocity, s.value.velocity) {
                    record.extend([v.x, v.y, v.z]);
                }
                record.push(s.et);
                record
            })
            .collect();
        table
    }

    /// Rotation samples of a quaternion table.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::InvalidTableFieldCount`] if the table does not have 5 fields.
    /// * [`KinematicError::InvalidTableRecord`] if a record does not have 5 values.
    /// * [`KinematicError::DegenerateQuaternion`] for a zero quaternion.
    pub fn to_rotations(&self) -> Result<Vec<(EphemerisTime, Rotation3<f64>)>, KinematicError> {
        if self.fields.len() != ROTATION_TABLE_FIELDS.len() {
            return Err(KinematicError::InvalidTableFieldCount {
                table: self.name.clone(),
                expected: "5",
                found: self.fields.len(),
            });
        }
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let (w, x, y, z, et) = record
                    .iter()
                    .copied()
                    .collect_tuple()
                    .ok_or_else(|| self.bad_record(index, record))?;
                let q = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f64::EPSILON)
                    .ok_or(KinematicError::DegenerateQuaternion(index))?;
                Ok((et, q.to_rotation_matrix()))
            })
            .collect()
    }

    /// Position samples of a 4 or 7 field table.
    ///
    /// Errors
    /// ----------
    /// * [`KinematicError::InvalidTableFieldCount`] for any other field count.
    /// * [`KinematicError::InvalidTableRecord`] if a record length differs from the field count.
    pub fn to_positions(&self) -> Result<Vec<(EphemerisTime, PositionState)>, KinematicError> {
        let with_velocity = match self.fields.len() {
            4 => false,
            7 => true,
            found => {
                return Err(KinematicError::InvalidTableFieldCount {
                    table: self.name.clone(),
                    expected: "4 or 7",
                    found,
                })
            }
        };
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if record.len() != self.fields.len() {
                    return Err(self.bad_record(index, record));
                }
                let position = Vector3::new(record[0], record[1], record[2]);
                let velocity =
                    with_velocity.then(|| Vector3::new(record[3], record[4], record[5]));
                Ok((record[record.len() - 1], PositionState::new(position, velocity)))
            })
            .collect()
    }

    fn bad_record(&self, index: usize, record: &[f64]) -> KinematicError {
        KinematicError::InvalidTableRecord {
            table: self.name.clone(),
            record: index,
            expected: self.fields.len(),
            found: record.len(),
        }
    }
}
