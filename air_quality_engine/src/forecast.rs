//! Hourly extrapolation from a current reading.
//!
//! Each pollutant is scaled by a diurnal profile (traffic peaks at 08:00 and
//! 18:00 local solar time; ozone follows the photochemical cycle peaking
//! mid-afternoon), a small seasonal term, optional weather damping and a
//! bounded random jitter. Factors are ratios against the seed instant, so
//! the first hours stay close to the observed values. Confidence decays
//! linearly with the horizon down to a floor of 0.4.

use std::f64::consts::PI;
use std::fmt;

use air_data_ingestor::{Coordinate, Pollutant, Weather};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::debug;

use crate::{
    aqi::{AqiResult, compute_aqi},
    cascade::estimator::{local_solar_hour, seasonal_term},
    errors::ValidationError,
    reading::{AggregatedReading, PollutantMap, PollutantReading},
};

pub const MAX_FORECAST_HOURS: u32 = 72;
pub const MIN_CONFIDENCE: f64 = 0.4;
pub const DEFAULT_DECAY_RATE: f64 = 0.02;
pub const DEFAULT_JITTER: f64 = 0.10;
pub const MAX_JITTER: f64 = 0.15;
/// An AQI change smaller than this over the horizon counts as stable.
pub const TREND_THRESHOLD: u16 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub hour_offset: u32,
    pub timestamp: DateTime<Utc>,
    pub pollutants: PollutantMap,
    pub aqi: AqiResult,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Worsening,
}

impl Trend {
    pub fn between(current: u16, last: u16) -> Self {
        if current.abs_diff(last) < TREND_THRESHOLD {
            Trend::Stable
        } else if last < current {
            Trend::Improving
        } else {
            Trend::Worsening
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Worsening => "worsening",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub hours: u32,
    pub avg_aqi: f64,
    pub max_aqi: u16,
    pub min_aqi: u16,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    pub coordinate: Coordinate,
    pub location_name: String,
    pub issued_at: DateTime<Utc>,
    pub current_aqi: u16,
    pub base_confidence: f64,
    pub points: Vec<ForecastPoint>,
    pub summary: ForecastSummary,
}

pub fn validate_hours(hours: u32) -> Result<u32, ValidationError> {
    if (1..=MAX_FORECAST_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ValidationError::ForecastHours(hours))
    }
}

#[derive(Debug, Clone)]
pub struct ForecastGenerator {
    decay_rate: f64,
    jitter: f64,
    seed: Option<u64>,
}

impl Default for ForecastGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_DECAY_RATE, DEFAULT_JITTER)
    }
}

impl ForecastGenerator {
    /// `jitter` is clamped to `[0, 0.15]`.
    pub fn new(decay_rate: f64, jitter: f64) -> Self {
        Self {
            decay_rate: decay_rate.max(0.0),
            jitter: jitter.clamp(0.0, MAX_JITTER),
            seed: None,
        }
    }

    /// Fixes the jitter sequence so repeated runs are identical.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn generate(
        &self,
        base: &AggregatedReading,
        hours: u32,
    ) -> Result<ForecastSeries, ValidationError> {
        let hours = validate_hours(hours)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let base_confidence = base.confidence.band.forecast_base();
        let longitude = base.coordinate.longitude();
        let base_hour = local_solar_hour(base.timestamp, longitude);
        let base_season = seasonal_term(base.timestamp);

        let points: Vec<ForecastPoint> = (1..=hours)
            .map(|h| {
                let timestamp = base.timestamp + TimeDelta::hours(i64::from(h));
                let hour = local_solar_hour(timestamp, longitude);
                let season = seasonal_term(timestamp);

                let pollutants: PollutantMap = base
                    .pollutants
                    .iter()
                    .map(|(pollutant, reading)| {
                        let factor = diurnal(pollutant, hour) / diurnal(pollutant, base_hour)
                            * seasonal(pollutant, season)
                            / seasonal(pollutant, base_season)
                            * meteorology(pollutant, base.weather.as_ref(), h)
                            * (1.0 + rng.random_range(-self.jitter..=self.jitter));
                        let value = (reading.value * factor).max(0.0);
                        let value = (value * 100.0).round() / 100.0;
                        let reading = PollutantReading::new(
                            pollutant,
                            value,
                            reading.source.clone(),
                            reading.quality,
                        );
                        (pollutant, reading)
                    })
                    .collect();

                ForecastPoint {
                    hour_offset: h,
                    timestamp,
                    aqi: compute_aqi(&pollutants),
                    pollutants,
                    confidence: (base_confidence - f64::from(h) * self.decay_rate)
                        .max(MIN_CONFIDENCE),
                }
            })
            .collect();

        let summary = summarize(base.aqi.value, &points);
        debug!(
            latitude = base.coordinate.latitude(),
            longitude,
            hours,
            trend = summary.trend.as_str(),
            "forecast generated"
        );

        Ok(ForecastSeries {
            coordinate: base.coordinate,
            location_name: base.location_name.clone(),
            issued_at: base.timestamp,
            current_aqi: base.aqi.value,
            base_confidence,
            points,
            summary,
        })
    }
}

fn summarize(current_aqi: u16, points: &[ForecastPoint]) -> ForecastSummary {
    let values: Vec<u16> = points.iter().map(|p| p.aqi.value).collect();
    let total: f64 = values.iter().map(|&v| f64::from(v)).sum();
    let avg = if values.is_empty() {
        f64::from(current_aqi)
    } else {
        total / values.len() as f64
    };
    let last = values.last().copied().unwrap_or(current_aqi);

    ForecastSummary {
        hours: points.len() as u32,
        avg_aqi: (avg * 10.0).round() / 10.0,
        max_aqi: values.iter().copied().max().unwrap_or(current_aqi),
        min_aqi: values.iter().copied().min().unwrap_or(current_aqi),
        trend: Trend::between(current_aqi, last),
    }
}

/// Shortest distance between two hours on the 24 h clock.
fn hours_apart(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(24.0);
    d.min(24.0 - d)
}

/// Raised-cosine bump of half-width 3 h centred on `peak`.
fn rush_hour(hour: f64, peak: f64) -> f64 {
    let d = hours_apart(hour, peak);
    if d < 3.0 {
        0.5 * (1.0 + (PI * d / 3.0).cos())
    } else {
        0.0
    }
}

/// Relative activity at a local solar hour; always positive.
pub fn diurnal(pollutant: Pollutant, hour: f64) -> f64 {
    match pollutant {
        Pollutant::Pm25 | Pollutant::Pm10 | Pollutant::No2 | Pollutant::Co => {
            0.85 + 0.3 * (rush_hour(hour, 8.0) + rush_hour(hour, 18.0))
        }
        Pollutant::O3 => 0.75 + 0.5 * (PI * (hour - 8.0) / 12.0).sin().max(0.0),
        Pollutant::So2 => 1.0,
    }
}

/// Summer raises ozone and lowers the combustion pollutants, by up to 10 %.
fn seasonal(pollutant: Pollutant, season: f64) -> f64 {
    let sign = if pollutant == Pollutant::O3 { 1.0 } else { -1.0 };
    1.0 + 0.1 * sign * season
}

/// Wind disperses, heat cooks ozone. Ramps in over the first 12 hours.
fn meteorology(pollutant: Pollutant, weather: Option<&Weather>, hour_offset: u32) -> f64 {
    let Some(w) = weather else {
        return 1.0;
    };
    let ramp = (f64::from(hour_offset) / 12.0).min(1.0);

    let dispersion = ((w.wind_speed_ms - 3.0) * 0.04).clamp(-0.1, 0.3);
    let mut factor = 1.0 - dispersion * ramp;
    if pollutant == Pollutant::O3 {
        let heat = ((w.temperature_c - 20.0) / 10.0 * 0.08).clamp(-0.1, 0.15);
        factor *= 1.0 + heat * ramp;
    }
    if factor.is_finite() { factor } else { 1.0 }
}

impl fmt::Display for ForecastSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}), {}h forecast from AQI {}",
            self.location_name, self.coordinate, self.summary.hours, self.current_aqi
        )?;
        for point in &self.points {
            writeln!(
                f,
                "+{:02}h {}  AQI {:>3} {:<30} confidence {:.2}",
                point.hour_offset,
                point.timestamp.format("%m-%d %H:%M"),
                point.aqi.value,
                point.aqi.category.label(),
                point.confidence
            )?;
        }
        write!(
            f,
            "avg {:.1}, min {}, max {}, trend {}",
            self.summary.avg_aqi,
            self.summary.min_aqi,
            self.summary.max_aqi,
            self.summary.trend.as_str()
        )
    }
}
