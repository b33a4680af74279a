//! Surveillance records as archived by the sensor network.

use serde::Serialize;

/// Geodetic position of a sensor or a reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    /// Metres
    pub alt_m: Option<f64>,
}

/// One archived message together with its reception metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveillanceRecord {
    /// Server receipt time, fractional seconds
    pub time_at_server: f64,
    /// Sensor-local receipt time
    pub time_at_sensor: Option<i64>,
    /// Rolling sensor timestamp
    pub timestamp: Option<i64>,
    pub sensor_serial: i32,
    pub sensor_type: String,
    pub sensor_latitude: Option<f64>,
    pub sensor_longitude: Option<f64>,
    pub sensor_altitude: Option<f64>,
    /// Hex-encoded Mode S payload
    pub raw_message: String,
}

impl SurveillanceRecord {
    /// Sensor position, if both coordinates are known.
    pub fn sensor_position(&self) -> Option<GeoPosition> {
        Some(GeoPosition {
            lat: self.sensor_latitude?,
            lon: self.sensor_longitude?,
            alt_m: self.sensor_altitude,
        })
    }
}
