//! Multi-source air-quality aggregation engine.
//!
//! For a coordinate, the engine consults registered providers through the
//! [`cascade`] resolver, normalizes units ([`normalize`]), derives an AQI
//! ([`aqi`]), rates reliability ([`confidence`]), caches the result
//! ([`cache`]) and can extrapolate an hourly [`forecast`]. The
//! [`service::AirQualityService`] facade ties these together behind
//! `get_current` / `get_forecast`.
//!
//! Provider failures never cross this boundary: the only user-visible error
//! is input validation ([`errors::EngineError`]).

pub mod aqi;
pub mod cache;
pub mod cascade;
pub mod clock;
pub mod confidence;
pub mod config;
pub mod errors;
pub mod forecast;
pub mod guidelines;
pub mod normalize;
pub mod reading;
pub mod service;

pub use errors::{EngineError, ValidationError};
pub use reading::{AggregatedReading, PollutantMap, PollutantReading, ReadingOrigin};
pub use service::{AirQualityService, CurrentReading};
