//! Request-level facade: validation, cache, resolution, forecast.

use std::sync::{Arc, Mutex, PoisonError};

use air_data_ingestor::{Coordinate, LocationResolver, WeatherProvider};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::{
    cache::{CacheStats, ReadingCache},
    cascade::{AttemptOutcome, CascadeResolver, ProviderAttempt, ProviderRegistry},
    clock::Clock,
    config::EngineConfig,
    errors::EngineError,
    forecast::{ForecastGenerator, ForecastSeries, validate_hours},
    reading::{AggregatedReading, ReadingOrigin},
};

/// A current reading and whether it was served from cache.
#[derive(Debug, Clone)]
pub struct CurrentReading {
    pub reading: Arc<AggregatedReading>,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub contributed: u64,
    pub superseded: u64,
    pub no_data: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub skipped_coverage: u64,
    pub not_queried: u64,
    pub deadline_exceeded: u64,
}

impl ProviderStats {
    fn record(&mut self, outcome: &AttemptOutcome) {
        let slot = match outcome {
            AttemptOutcome::Contributed(_) => &mut self.contributed,
            AttemptOutcome::Superseded => &mut self.superseded,
            AttemptOutcome::NoData => &mut self.no_data,
            AttemptOutcome::Failed(_) => &mut self.failed,
            AttemptOutcome::TimedOut => &mut self.timed_out,
            AttemptOutcome::SkippedCoverage => &mut self.skipped_coverage,
            AttemptOutcome::NotQueried => &mut self.not_queried,
            AttemptOutcome::DeadlineExceeded => &mut self.deadline_exceeded,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    pub total_requests: u64,
    pub forecast_requests: u64,
    pub resolutions: u64,
    pub estimator_fallbacks: u64,
    pub default_fallbacks: u64,
    pub providers: IndexMap<String, ProviderStats>,
    pub cache: CacheStats,
}

#[derive(Default)]
struct Counters {
    total_requests: u64,
    forecast_requests: u64,
    resolutions: u64,
    estimator_fallbacks: u64,
    default_fallbacks: u64,
    providers: IndexMap<String, ProviderStats>,
}

pub struct AirQualityService {
    resolver: CascadeResolver,
    cache: ReadingCache,
    forecaster: ForecastGenerator,
    counters: Mutex<Counters>,
}

impl AirQualityService {
    pub fn new(
        resolver: CascadeResolver,
        cache: ReadingCache,
        forecaster: ForecastGenerator,
    ) -> Self {
        Self {
            resolver,
            cache,
            forecaster,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Wires a service from configuration. `weather` and `locator` are
    /// optional collaborators.
    pub fn from_config(
        config: &EngineConfig,
        registry: ProviderRegistry,
        weather: Option<Arc<dyn WeatherProvider>>,
        locator: Option<Arc<dyn LocationResolver>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut resolver = CascadeResolver::new(registry, clock.clone())
            .with_dispatch(config.resolver.dispatch)
            .with_outer_deadline(config.outer_deadline());
        if let Some(weather) = weather {
            resolver = resolver.with_weather(weather, config.weather_timeout());
        }
        if let Some(locator) = locator {
            resolver = resolver.with_locator(locator, config.location_timeout());
        }

        let mut forecaster =
            ForecastGenerator::new(config.forecast.decay_rate, config.forecast.jitter);
        if let Some(seed) = config.forecast.seed {
            forecaster = forecaster.with_seed(seed);
        }

        Self::new(resolver, ReadingCache::new(config.cache_ttl(), clock), forecaster)
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn resolver(&self) -> &CascadeResolver {
        &self.resolver
    }

    /// Current air quality at `(latitude, longitude)`.
    ///
    /// Only invalid coordinates fail; provider trouble lowers confidence instead.
    pub async fn get_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentReading, EngineError> {
        debug!(latitude, longitude, "current reading requested");
        let coordinate = Coordinate::new(latitude, longitude)?;
        self.lock().total_requests += 1;
        Ok(self.current_at(coordinate).await)
    }

    /// Hourly forecast for the next `hours` hours (1..=72), seeded from the
    /// current reading.
    pub async fn get_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<ForecastSeries, EngineError> {
        debug!(latitude, longitude, hours, "forecast requested");
        let hours = validate_hours(hours)?;
        let coordinate = Coordinate::new(latitude, longitude)?;
        {
            let mut counters = self.lock();
            counters.total_requests += 1;
            counters.forecast_requests += 1;
        }

        let current = self.current_at(coordinate).await;
        Ok(self.forecaster.generate(&current.reading, hours)?)
    }

    pub async fn stats(&self) -> ServiceStats {
        let cache = self.cache.stats().await;
        let counters = self.lock();
        ServiceStats {
            total_requests: counters.total_requests,
            forecast_requests: counters.forecast_requests,
            resolutions: counters.resolutions,
            estimator_fallbacks: counters.estimator_fallbacks,
            default_fallbacks: counters.default_fallbacks,
            providers: counters.providers.clone(),
            cache,
        }
    }

    async fn current_at(&self, coordinate: Coordinate) -> CurrentReading {
        if let Some(reading) = self.cache.get(&coordinate).await {
            return CurrentReading {
                reading,
                cache_hit: true,
            };
        }

        let resolution = self.resolver.resolve_detailed(coordinate).await;
        self.record(&resolution.reading, &resolution.attempts);

        let reading = Arc::new(resolution.reading);
        self.cache.put(&coordinate, Arc::clone(&reading)).await;
        debug!(aqi = reading.aqi.value, "reading cached");

        CurrentReading {
            reading,
            cache_hit: false,
        }
    }

    fn record(&self, reading: &AggregatedReading, attempts: &[ProviderAttempt]) {
        let mut counters = self.lock();
        counters.resolutions += 1;
        match reading.origin {
            ReadingOrigin::Measured => {}
            ReadingOrigin::Estimated => counters.estimator_fallbacks += 1,
            ReadingOrigin::Default => counters.default_fallbacks += 1,
        }
        for attempt in attempts {
            counters
                .providers
                .entry(attempt.provider.clone())
                .or_default()
                .record(&attempt.outcome);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
