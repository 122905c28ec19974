use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use air_data_ingestor::{
    Coordinate, LocationResolver, Pollutant, ProviderError, QualityTag, Weather, WeatherProvider,
};
use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, warn};

use super::{
    estimator::{ESTIMATOR_SOURCE, RegionalEstimator},
    registry::{ProviderDescriptor, ProviderRegistry},
};
use crate::{
    aqi::compute_aqi,
    clock::Clock,
    confidence::{self, Confidence, Contribution},
    normalize::normalize,
    reading::{AggregatedReading, PollutantMap, PollutantReading, ReadingOrigin},
};

pub const DEFAULT_OUTER_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
pub const FALLBACK_SOURCE: &str = "fallback-default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Query every eligible provider at once.
    #[default]
    Concurrent,
    /// Walk providers in priority order, skipping those with nothing to add.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum AttemptOutcome {
    /// Supplied this many pollutants to the final reading.
    Contributed(usize),
    /// Answered, but every pollutant went to another provider.
    Superseded,
    NoData,
    Failed(String),
    TimedOut,
    SkippedCoverage,
    /// Eligible but not asked (sequential mode had nothing for it to add).
    NotQueried,
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

/// A reading plus what happened with each registered provider.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reading: AggregatedReading,
    pub attempts: Vec<ProviderAttempt>,
}

enum Answer {
    Data(PollutantMap),
    Empty,
    Failed(String),
    TimedOut,
}

pub struct CascadeResolver {
    registry: ProviderRegistry,
    estimator: RegionalEstimator,
    dispatch: DispatchMode,
    outer_deadline: Duration,
    weather: Option<Arc<dyn WeatherProvider>>,
    weather_timeout: Duration,
    locator: Option<Arc<dyn LocationResolver>>,
    location_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CascadeResolver {
    pub fn new(registry: ProviderRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            estimator: RegionalEstimator::default(),
            dispatch: DispatchMode::default(),
            outer_deadline: DEFAULT_OUTER_DEADLINE,
            weather: None,
            weather_timeout: DEFAULT_LOOKUP_TIMEOUT,
            locator: None,
            location_timeout: DEFAULT_LOOKUP_TIMEOUT,
            clock,
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_outer_deadline(mut self, deadline: Duration) -> Self {
        self.outer_deadline = deadline;
        self
    }

    pub fn with_estimator(mut self, estimator: RegionalEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_weather(mut self, provider: Arc<dyn WeatherProvider>, timeout: Duration) -> Self {
        self.weather = Some(provider);
        self.weather_timeout = timeout;
        self
    }

    pub fn with_locator(mut self, resolver: Arc<dyn LocationResolver>, timeout: Duration) -> Self {
        self.locator = Some(resolver);
        self.location_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn resolve(&self, coordinate: Coordinate) -> AggregatedReading {
        self.resolve_detailed(coordinate).await.reading
    }

    /// Resolves a coordinate and reports the outcome for every registered
    /// provider. Never fails: with no provider data the regional estimate is
    /// used instead.
    pub async fn resolve_detailed(&self, coordinate: Coordinate) -> Resolution {
        let providers = self.registry.as_slice();
        let deadline = Instant::now() + self.outer_deadline;

        let mut attempts: Vec<ProviderAttempt> = providers
            .iter()
            .map(|d| ProviderAttempt {
                provider: d.name.clone(),
                outcome: if d.coverage.accepts(&coordinate) {
                    AttemptOutcome::NotQueried
                } else {
                    AttemptOutcome::SkippedCoverage
                },
                elapsed_ms: None,
            })
            .collect();
        let eligible: Vec<usize> = attempts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.outcome == AttemptOutcome::NotQueried)
            .map(|(i, _)| i)
            .collect();

        let dispatch = async {
            match self.dispatch {
                DispatchMode::Concurrent => {
                    self.fan_out(coordinate, &eligible, deadline, &mut attempts).await
                }
                DispatchMode::Sequential => {
                    self.walk(coordinate, &eligible, deadline, &mut attempts).await
                }
            }
        };
        let (answers, weather, location_name) = tokio::join!(
            dispatch,
            self.fetch_weather(coordinate, deadline),
            self.location_name(coordinate, deadline)
        );

        let (pollutants, holders) = merge(providers, answers);

        for (idx, attempt) in attempts.iter_mut().enumerate() {
            if attempt.outcome == AttemptOutcome::Contributed(0) {
                let supplied = holders.values().filter(|&&h| h == idx).count();
                attempt.outcome = if supplied > 0 {
                    AttemptOutcome::Contributed(supplied)
                } else {
                    AttemptOutcome::Superseded
                };
            }
        }

        let now = self.clock.now();
        let reading = if pollutants.is_empty() {
            self.estimated_reading(coordinate, now, location_name, weather)
        } else {
            let contributions = holders.iter().map(|(pollutant, &idx)| Contribution {
                class: providers[idx].class,
                specialty: providers[idx].is_specialist_for(*pollutant),
            });
            let confidence = confidence::score(contributions, &pollutants);
            let sources_used: IndexSet<String> = attempts
                .iter()
                .filter(|a| matches!(a.outcome, AttemptOutcome::Contributed(_)))
                .map(|a| a.provider.clone())
                .collect();

            AggregatedReading {
                coordinate,
                timestamp: now,
                location_name,
                aqi: compute_aqi(&pollutants),
                pollutants,
                confidence,
                sources_used,
                origin: ReadingOrigin::Measured,
                region_profile: None,
                weather,
            }
        };

        info!(
            latitude = coordinate.latitude(),
            longitude = coordinate.longitude(),
            aqi = reading.aqi.value,
            origin = reading.origin.as_str(),
            sources = reading.sources_used.len(),
            "resolved reading"
        );
        for attempt in &attempts {
            debug!(
                provider = %attempt.provider,
                outcome = ?attempt.outcome,
                elapsed_ms = ?attempt.elapsed_ms,
                "provider attempt"
            );
        }

        Resolution { reading, attempts }
    }

    async fn fan_out(
        &self,
        coordinate: Coordinate,
        eligible: &[usize],
        deadline: Instant,
        attempts: &mut [ProviderAttempt],
    ) -> Vec<(usize, PollutantMap)> {
        let providers = self.registry.as_slice();
        let mut pending: FuturesUnordered<_> = eligible
            .iter()
            .map(|&idx| {
                let descriptor = &providers[idx];
                async move { (idx, query(descriptor, coordinate, descriptor.timeout).await) }
            })
            .collect();

        let mut answers = Vec::new();
        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                next = pending.next() => {
                    let Some((idx, (answer, elapsed))) = next else { break };
                    if let Some(map) = record(&mut attempts[idx], answer, elapsed) {
                        answers.push((idx, map));
                    }
                }
                _ = &mut expiry => {
                    warn!(
                        latitude = coordinate.latitude(),
                        longitude = coordinate.longitude(),
                        outstanding = pending.len(),
                        "outer deadline reached; merging partial results"
                    );
                    for &idx in eligible {
                        if attempts[idx].outcome == AttemptOutcome::NotQueried {
                            attempts[idx].outcome = AttemptOutcome::DeadlineExceeded;
                        }
                    }
                    break;
                }
            }
        }

        answers
    }

    async fn walk(
        &self,
        coordinate: Coordinate,
        eligible: &[usize],
        deadline: Instant,
        attempts: &mut [ProviderAttempt],
    ) -> Vec<(usize, PollutantMap)> {
        let providers = self.registry.as_slice();
        let mut answers: Vec<(usize, PollutantMap)> = Vec::new();

        for &idx in eligible {
            let descriptor = &providers[idx];
            let covered = descriptor
                .specialty
                .iter()
                .all(|&p| answers.iter().any(|(_, map)| map.contains(p)));
            if !answers.is_empty() && covered {
                debug!(provider = %descriptor.name, "nothing to add; not queried");
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                attempts[idx].outcome = AttemptOutcome::DeadlineExceeded;
                continue;
            }

            let (answer, elapsed) =
                query(descriptor, coordinate, descriptor.timeout.min(remaining)).await;
            if let Some(map) = record(&mut attempts[idx], answer, elapsed) {
                answers.push((idx, map));
            }
        }

        answers
    }

    /// Weather and location lookups share the outer deadline with dispatch.
    fn lookup_budget(limit: Duration, deadline: Instant) -> Duration {
        limit.min(deadline.saturating_duration_since(Instant::now()))
    }

    async fn fetch_weather(&self, coordinate: Coordinate, deadline: Instant) -> Option<Weather> {
        let provider = self.weather.as_ref()?;
        let budget = Self::lookup_budget(self.weather_timeout, deadline);
        match timeout(budget, provider.fetch_weather(coordinate)).await {
            Ok(Ok(weather)) => Some(weather),
            Ok(Err(err)) => {
                debug!(error = %err, "weather unavailable");
                None
            }
            Err(_) => {
                debug!(timeout_ms = budget.as_millis() as u64, "weather lookup timed out");
                None
            }
        }
    }

    async fn location_name(&self, coordinate: Coordinate, deadline: Instant) -> String {
        if let Some(locator) = &self.locator {
            let budget = Self::lookup_budget(self.location_timeout, deadline);
            match timeout(budget, locator.resolve_location_name(coordinate)).await {
                Ok(Ok(name)) if !name.trim().is_empty() => return name,
                Ok(Ok(_)) => debug!("location resolver returned an empty name"),
                Ok(Err(err)) => debug!(error = %err, "location lookup failed"),
                Err(_) => debug!("location lookup timed out"),
            }
        }
        fallback_location_name(&coordinate)
    }

    fn estimated_reading(
        &self,
        coordinate: Coordinate,
        now: chrono::DateTime<chrono::Utc>,
        location_name: String,
        weather: Option<Weather>,
    ) -> AggregatedReading {
        let estimate = self.estimator.estimate(&coordinate, now);
        if estimate.pollutants.is_empty() {
            warn!(
                latitude = coordinate.latitude(),
                longitude = coordinate.longitude(),
                "estimator produced nothing; using default values"
            );
            return default_reading(coordinate, now, location_name, weather);
        }

        info!(
            latitude = coordinate.latitude(),
            longitude = coordinate.longitude(),
            profile = estimate.profile.as_str(),
            "no provider data; using regional estimate"
        );
        let confidence = confidence::score(std::iter::empty(), &estimate.pollutants);
        AggregatedReading {
            coordinate,
            timestamp: now,
            location_name,
            aqi: compute_aqi(&estimate.pollutants),
            pollutants: estimate.pollutants,
            confidence,
            sources_used: IndexSet::from([ESTIMATOR_SOURCE.to_string()]),
            origin: ReadingOrigin::Estimated,
            region_profile: Some(estimate.profile),
            weather,
        }
    }
}

/// Calls one provider under `budget`, converting every failure mode
/// (including a panic inside the adapter) into an [`Answer`].
async fn query(
    descriptor: &ProviderDescriptor,
    coordinate: Coordinate,
    budget: Duration,
) -> (Answer, Duration) {
    let started = Instant::now();
    let call = AssertUnwindSafe(descriptor.provider().fetch_measurements(coordinate, budget))
        .catch_unwind();

    let answer = match timeout(budget, call).await {
        Err(_) => Answer::TimedOut,
        Ok(Err(_panic)) => Answer::Failed("provider panicked".to_string()),
        Ok(Ok(Err(ProviderError::NoData { .. }))) => Answer::Empty,
        Ok(Ok(Err(ProviderError::Timeout(_)))) => Answer::TimedOut,
        Ok(Ok(Err(err))) => Answer::Failed(err.to_string()),
        Ok(Ok(Ok(measurements))) => {
            let map = normalize(&measurements);
            if map.is_empty() { Answer::Empty } else { Answer::Data(map) }
        }
    };
    (answer, started.elapsed())
}

/// Stores the outcome on the attempt and hands back any data. Providers
/// with data are marked `Contributed(0)` until the merge settles.
fn record(
    attempt: &mut ProviderAttempt,
    answer: Answer,
    elapsed: Duration,
) -> Option<PollutantMap> {
    attempt.elapsed_ms = Some(elapsed.as_millis() as u64);
    let (outcome, data) = match answer {
        Answer::Data(map) => (AttemptOutcome::Contributed(0), Some(map)),
        Answer::Empty => (AttemptOutcome::NoData, None),
        Answer::Failed(reason) => {
            warn!(provider = %attempt.provider, %reason, "provider failed");
            (AttemptOutcome::Failed(reason), None)
        }
        Answer::TimedOut => {
            warn!(
                provider = %attempt.provider,
                elapsed_ms = attempt.elapsed_ms,
                "provider timed out"
            );
            (AttemptOutcome::TimedOut, None)
        }
    };
    attempt.outcome = outcome;
    data
}

/// Folds provider answers into one map. Lower index wins a pollutant,
/// except that a specialist for the pollutant displaces a non-specialist.
/// Returns the map and, per pollutant, the index of the provider holding it.
fn merge(
    providers: &[ProviderDescriptor],
    mut answers: Vec<(usize, PollutantMap)>,
) -> (PollutantMap, BTreeMap<Pollutant, usize>) {
    answers.sort_by_key(|(idx, _)| *idx);

    let mut merged = PollutantMap::new();
    let mut holders: BTreeMap<Pollutant, usize> = BTreeMap::new();

    for (idx, map) in answers {
        let candidate = &providers[idx];
        for (pollutant, reading) in map {
            let take = match holders.get(&pollutant) {
                None => true,
                Some(&current) => {
                    candidate.is_specialist_for(pollutant)
                        && !providers[current].is_specialist_for(pollutant)
                }
            };
            if take {
                if holders.contains_key(&pollutant) {
                    debug!(
                        provider = %candidate.name,
                        %pollutant,
                        "specialist overrides earlier value"
                    );
                }
                merged.insert(pollutant, reading);
                holders.insert(pollutant, idx);
            }
        }
    }

    (merged, holders)
}

pub fn fallback_location_name(coordinate: &Coordinate) -> String {
    format!("Location {:.3}, {:.3}", coordinate.latitude(), coordinate.longitude())
}

/// Fixed conservative reading for total source failure.
pub fn default_reading(
    coordinate: Coordinate,
    now: chrono::DateTime<chrono::Utc>,
    location_name: String,
    weather: Option<Weather>,
) -> AggregatedReading {
    let pollutants: PollutantMap = [
        (Pollutant::Pm25, 15.0),
        (Pollutant::Pm10, 25.0),
        (Pollutant::No2, 20.0),
    ]
    .into_iter()
    .map(|(p, v)| (p, PollutantReading::new(p, v, FALLBACK_SOURCE, QualityTag::Estimated)))
    .collect();

    AggregatedReading {
        coordinate,
        timestamp: now,
        location_name,
        aqi: compute_aqi(&pollutants),
        pollutants,
        confidence: Confidence::low(),
        sources_used: IndexSet::from([FALLBACK_SOURCE.to_string()]),
        origin: ReadingOrigin::Default,
        region_profile: None,
        weather,
    }
}
