//! Persistence boundary of the convert pipeline.

use crate::normalize::{ResolvedPosition, ResolvedVelocity};
use crate::record::{GeoPosition, SurveillanceRecord};

/// Transactional store for decoded facts.
///
/// Nothing written becomes durable before [`FactSink::commit`]. Every
/// position or velocity row is preceded by an upsert of its sensor.
pub trait FactSink {
    type Error;

    /// Insert or update a sensor. A known position is never replaced by `None`.
    fn upsert_sensor(
        &mut self,
        serial: i32,
        position: Option<&GeoPosition>,
    ) -> Result<(), Self::Error>;

    fn append_position(
        &mut self,
        record: &SurveillanceRecord,
        position: &ResolvedPosition,
    ) -> Result<(), Self::Error>;

    fn append_velocity(
        &mut self,
        record: &SurveillanceRecord,
        velocity: &ResolvedVelocity,
    ) -> Result<(), Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;
}
