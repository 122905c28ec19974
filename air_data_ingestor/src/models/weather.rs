use serde::{Deserialize, Serialize};

/// Surface weather at a coordinate, as supplied by the weather collaborator.
///
/// Only used to damp forecast extrapolation; the engine never fetches it itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Air temperature (°C).
    pub temperature_c: f64,
    /// Relative humidity (%).
    pub humidity_pct: f64,
    /// Wind speed (m/s).
    pub wind_speed_ms: f64,
    /// Meteorological wind direction (degrees, 0 = from north).
    pub wind_direction_deg: f64,
    /// Sea-level pressure (hPa).
    pub pressure_hpa: f64,
    /// Horizontal visibility (km).
    pub visibility_km: f64,
}
