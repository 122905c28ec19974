//! Provider abstraction for air-quality data sources.
//!
//! This module defines the async contracts every external collaborator
//! satisfies:
//!
//! - [`MeasurementProvider`]: pollutant measurements for a coordinate
//!   (ground networks, satellites, model outputs).
//! - [`WeatherProvider`]: surface weather, used only to damp forecasts.
//! - [`LocationResolver`]: reverse geocoding for display names.
//!
//! The traits are object safe so the engine can hold them as
//! `Arc<dyn MeasurementProvider>` and choose sources at runtime.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use air_data_ingestor::{
//!     ConcentrationUnit, Coordinate, Measurement, MeasurementProvider, Pollutant,
//!     ProviderError,
//! };
//! use async_trait::async_trait;
//! use chrono::Utc;
//!
//! struct Constant;
//!
//! #[async_trait]
//! impl MeasurementProvider for Constant {
//!     async fn fetch_measurements(
//!         &self,
//!         _coordinate: Coordinate,
//!         _timeout: Duration,
//!     ) -> Result<Vec<Measurement>, ProviderError> {
//!         Ok(vec![Measurement::new(
//!             Pollutant::Pm25,
//!             8.0,
//!             ConcentrationUnit::MicrogramsPerCubicMeter,
//!             "constant",
//!             Utc::now(),
//!         )])
//!     }
//! }
//! ```

pub mod errors;
pub mod replay;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{coordinate::Coordinate, measurement::Measurement, weather::Weather};
use errors::ProviderError;

/// Fetches raw pollutant measurements near a coordinate.
#[async_trait]
pub trait MeasurementProvider: Send + Sync {
    /// Returns whatever the source has for `coordinate`.
    ///
    /// `timeout` is the budget the caller will enforce; adapters may use it to
    /// configure their own transport. An empty vector and
    /// [`ProviderError::NoData`] are both treated as "nothing here".
    async fn fetch_measurements(
        &self,
        coordinate: Coordinate,
        timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError>;
}

/// Fetches current surface weather.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<Weather, ProviderError>;
}

/// Reverse geocoding for display purposes.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve_location_name(&self, coordinate: Coordinate) -> Result<String, ProviderError>;
}
