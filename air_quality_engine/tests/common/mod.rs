#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use air_data_ingestor::{
    ConcentrationUnit, Coordinate, LocationResolver, Measurement, MeasurementProvider, Pollutant,
    ProviderError, Weather, WeatherProvider,
};
use air_quality_engine::{
    AirQualityService,
    cache::ReadingCache,
    cascade::{CascadeResolver, ProviderClass, ProviderDescriptor, ProviderRegistry},
    clock::ManualClock,
    forecast::ForecastGenerator,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// 2024-06-15 12:00 UTC, a fixed "now" for every scenario.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(noon()))
}

pub fn paris() -> Coordinate {
    Coordinate::new(48.8566, 2.3522).unwrap()
}

/// Answers with the same measurements every time and counts calls.
pub struct StaticProvider {
    source: String,
    values: Vec<(Pollutant, f64, ConcentrationUnit)>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticProvider {
    /// Values are in µg/m³ (mg/m³ for CO).
    pub fn new(source: &str, values: &[(Pollutant, f64)]) -> Self {
        Self {
            source: source.to_string(),
            values: values.iter().map(|&(p, v)| (p, v, p.canonical_unit())).collect(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_units(source: &str, values: &[(Pollutant, f64, ConcentrationUnit)]) -> Self {
        Self {
            values: values.to_vec(),
            ..Self::new(source, &[])
        }
    }

    /// Sleeps (on the tokio clock) before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl MeasurementProvider for StaticProvider {
    async fn fetch_measurements(
        &self,
        _coordinate: Coordinate,
        _timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .values
            .iter()
            .map(|&(p, v, unit)| Measurement::new(p, v, unit, self.source.clone(), noon()))
            .collect())
    }
}

pub struct FailingProvider;

#[async_trait]
impl MeasurementProvider for FailingProvider {
    async fn fetch_measurements(
        &self,
        _coordinate: Coordinate,
        _timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl MeasurementProvider for HangingProvider {
    async fn fetch_measurements(
        &self,
        _coordinate: Coordinate,
        _timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError> {
        std::future::pending().await
    }
}

pub struct PanickingProvider;

#[async_trait]
impl MeasurementProvider for PanickingProvider {
    async fn fetch_measurements(
        &self,
        _coordinate: Coordinate,
        _timeout: Duration,
    ) -> Result<Vec<Measurement>, ProviderError> {
        panic!("adapter bug")
    }
}

pub struct FixedLocator(pub &'static str);

#[async_trait]
impl LocationResolver for FixedLocator {
    async fn resolve_location_name(
        &self,
        _coordinate: Coordinate,
    ) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

pub struct FixedWeather(pub Weather);

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn fetch_weather(&self, _coordinate: Coordinate) -> Result<Weather, ProviderError> {
        Ok(self.0)
    }
}

/// Never answers.
pub struct HangingWeather;

#[async_trait]
impl WeatherProvider for HangingWeather {
    async fn fetch_weather(&self, _coordinate: Coordinate) -> Result<Weather, ProviderError> {
        std::future::pending().await
    }
}

/// Never answers.
pub struct HangingLocator;

#[async_trait]
impl LocationResolver for HangingLocator {
    async fn resolve_location_name(
        &self,
        _coordinate: Coordinate,
    ) -> Result<String, ProviderError> {
        std::future::pending().await
    }
}

pub fn calm_weather() -> Weather {
    Weather {
        temperature_c: 22.0,
        humidity_pct: 55.0,
        wind_speed_ms: 3.0,
        wind_direction_deg: 240.0,
        pressure_hpa: 1015.0,
        visibility_km: 15.0,
    }
}

pub fn descriptor(
    name: &str,
    class: ProviderClass,
    provider: impl MeasurementProvider + 'static,
) -> ProviderDescriptor {
    ProviderDescriptor::new(name, class, Arc::new(provider))
}

/// A service over `registry` with a 300 s cache and a seeded forecaster.
pub fn service(registry: ProviderRegistry, clock: Arc<ManualClock>) -> AirQualityService {
    let resolver = CascadeResolver::new(registry, clock.clone())
        .with_locator(Arc::new(FixedLocator("Testville")), Duration::from_secs(2));
    AirQualityService::new(
        resolver,
        ReadingCache::new(Duration::from_secs(300), clock),
        ForecastGenerator::default().with_seed(7),
    )
}
