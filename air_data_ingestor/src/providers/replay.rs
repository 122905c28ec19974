//! Fixture-backed provider that replays recorded data.
//!
//! A single JSON fixture can describe several named measurement sources plus
//! weather and place names. Each site answers for coordinates within its
//! `radius_km`; the nearest site wins when several overlap.
//!
//! ```json
//! {
//!   "providers": {
//!     "openaq": [
//!       { "latitude": 41.88, "longitude": -87.63, "radius_km": 50,
//!         "measurements": [ { "pollutant": "pm2.5", "value": 14.2, "unit": "µg/m³" } ] }
//!     ]
//!   },
//!   "weather": [
//!     { "latitude": 41.88, "longitude": -87.63,
//!       "weather": { "temperature_c": 21.0, "humidity_pct": 55.0,
//!                    "wind_speed_ms": 4.2, "wind_direction_deg": 240.0,
//!                    "pressure_hpa": 1014.0, "visibility_km": 16.0 } }
//!   ],
//!   "locations": [ { "latitude": 41.88, "longitude": -87.63, "name": "Chicago, Illinois, USA" } ]
//! }
//! ```

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::{
    models::{
        coordinate::Coordinate,
        measurement::{Measurement, QualityTag},
        pollutant::Pollutant,
        unit::ConcentrationUnit,
        weather::Weather,
    },
    providers::{
        LocationResolver, MeasurementProvider, WeatherProvider,
        errors::{ProviderError, ProviderInitError},
    },
};

const DEFAULT_RADIUS_KM: f64 = 50.0;

fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

/// Parsed replay fixture.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayFixture {
    /// Provider name -> recorded sites.
    #[serde(default)]
    pub providers: HashMap<String, Vec<RecordedSite>>,
    #[serde(default)]
    pub weather: Vec<WeatherSite>,
    #[serde(default)]
    pub locations: Vec<NamedSite>,
}

/// Measurements recorded around one point.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedSite {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// When set, the site answers with this API error instead of data.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub measurements: Vec<RecordedMeasurement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedMeasurement {
    pub pollutant: Pollutant,
    pub value: f64,
    pub unit: ConcentrationUnit,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quality: QualityTag,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSite {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    pub weather: Weather,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedSite {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    pub name: String,
}

/// Anything in a fixture that is pinned to a point with a catchment radius.
trait Sited {
    fn site(&self) -> (f64, f64, f64);
}

impl Sited for RecordedSite {
    fn site(&self) -> (f64, f64, f64) {
        (self.latitude, self.longitude, self.radius_km)
    }
}

impl Sited for WeatherSite {
    fn site(&self) -> (f64, f64, f64) {
        (self.latitude, self.longitude, self.radius_km)
    }
}

impl Sited for NamedSite {
    fn site(&self) -> (f64, f64, f64) {
        (self.latitude, self.longitude, self.radius_km)
    }
}

/// Nearest entry whose catchment covers `coordinate`.
fn nearest<'a, T: Sited>(sites: &'a [T], coordinate: &Coordinate) -> Option<&'a T> {
    sites
        .iter()
        .filter_map(|s| {
            let (lat, lon, radius) = s.site();
            let centre = Coordinate::new(lat, lon).ok()?;
            let d = centre.distance_km(coordinate);
            (d <= radius).then_some((d, s))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, s)| s)
}

impl ReplayFixture {
    pub fn from_json_str(json: &str) -> Result<Self, ProviderInitError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderInitError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Names of the measurement sources the fixture records.
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Replays one named source out of a shared [`ReplayFixture`].
///
/// Also answers weather and location lookups from the same fixture, so a
/// single instance can stand in for every external collaborator.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    name: String,
    fixture: Arc<ReplayFixture>,
}

impl ReplayProvider {
    pub fn new(name: impl Into<String>, fixture: Arc<ReplayFixture>) -> Self {
        Self {
            name: name.into(),
            fixture,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn no_data(coordinate: &Coordinate) -> ProviderError {
        ProviderError::NoData {
            latitude: coordinate.latitude(),
            longitude: coordinate.longitude(),
        }
    }
}

#[async_trait]
impl MeasurementProvider for ReplayProvider {
    async fn fetch_measurements(
        &self,
        coordinate: Coordinate,
        _timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError> {
        let sites = self
            .fixture
            .providers
            .get(&self.name)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let site = nearest(sites, &coordinate).ok_or_else(|| Self::no_data(&coordinate))?;
        if let Some(message) = &site.error {
            return Err(ProviderError::Api(message.clone()));
        }

        let now = Utc::now();
        let measurements: Vec<Measurement> = site
            .measurements
            .iter()
            .map(|m| {
                Measurement::new(
                    m.pollutant,
                    m.value,
                    m.unit,
                    self.name.clone(),
                    m.observed_at.unwrap_or(now),
                )
                .with_quality(m.quality)
            })
            .collect();

        debug!(
            provider = %self.name,
            latitude = coordinate.latitude(),
            longitude = coordinate.longitude(),
            count = measurements.len(),
            "replayed measurements"
        );
        Ok(measurements)
    }
}

#[async_trait]
impl WeatherProvider for ReplayProvider {
    async fn fetch_weather(&self, coordinate: Coordinate) -> Result<Weather, ProviderError> {
        nearest(&self.fixture.weather, &coordinate)
            .map(|site| site.weather)
            .ok_or_else(|| Self::no_data(&coordinate))
    }
}

#[async_trait]
impl LocationResolver for ReplayProvider {
    async fn resolve_location_name(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        nearest(&self.fixture.locations, &coordinate)
            .map(|site| site.name.clone())
            .ok_or_else(|| Self::no_data(&coordinate))
    }
}
