pub mod cache_table;
pub mod constants;
pub mod ephemeris_source;
pub mod fitting;
pub mod kinematic_errors;
pub mod params;
pub mod position;
pub mod rotation;
pub mod time_cache;

pub use kinematic_errors::{KinematicError, SourceError};
pub use params::{ExtrapolationPolicy, ModelParams};
pub use position::PositionModel;
pub use rotation::OrientationModel;
