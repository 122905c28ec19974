//! Domain vocabulary and provider contracts for air-quality data sources.
//!
//! [`models`] holds the vendor-agnostic types every source speaks
//! (coordinates, pollutants, units, raw measurements, weather), and
//! [`providers`] defines the async traits a concrete source adapter
//! implements, plus a fixture-backed [`providers::replay`] adapter.

pub mod models;
pub mod providers;

pub use models::{
    coordinate::{BoundingBox, Coordinate, CoordinateError},
    measurement::{Measurement, QualityTag},
    pollutant::{Pollutant, UnknownPollutant},
    unit::{ConcentrationUnit, UnknownUnit},
    weather::Weather,
};
pub use providers::{
    LocationResolver, MeasurementProvider, WeatherProvider,
    errors::{ProviderError, ProviderInitError},
};
