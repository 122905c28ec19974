//! The engine's output record and the pollutant map it is built around.

use std::collections::{BTreeMap, btree_map};
use std::fmt;

use air_data_ingestor::{ConcentrationUnit, Coordinate, Pollutant, QualityTag, Weather};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

use crate::{
    aqi::AqiResult, cascade::estimator::RegionProfile, confidence::Confidence,
    guidelines::who_assessment,
};

/// A normalized concentration in the pollutant's canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantReading {
    pub value: f64,
    pub unit: ConcentrationUnit,
    pub source: String,
    pub quality: QualityTag,
}

impl PollutantReading {
    pub fn new(
        pollutant: Pollutant,
        value: f64,
        source: impl Into<String>,
        quality: QualityTag,
    ) -> Self {
        Self {
            value,
            unit: pollutant.canonical_unit(),
            source: source.into(),
            quality,
        }
    }
}

/// Pollutant to reading, iterated in AQI priority order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PollutantMap(BTreeMap<Pollutant, PollutantReading>);

impl PollutantMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; returns the reading that was displaced.
    pub fn insert(
        &mut self,
        pollutant: Pollutant,
        reading: PollutantReading,
    ) -> Option<PollutantReading> {
        self.0.insert(pollutant, reading)
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<&PollutantReading> {
        self.0.get(&pollutant)
    }

    pub fn value(&self, pollutant: Pollutant) -> Option<f64> {
        self.0.get(&pollutant).map(|r| r.value)
    }

    pub fn contains(&self, pollutant: Pollutant) -> bool {
        self.0.contains_key(&pollutant)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pollutants(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, &PollutantReading)> {
        self.0.iter().map(|(p, r)| (*p, r))
    }
}

impl IntoIterator for PollutantMap {
    type Item = (Pollutant, PollutantReading);
    type IntoIter = btree_map::IntoIter<Pollutant, PollutantReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(Pollutant, PollutantReading)> for PollutantMap {
    fn from_iter<I: IntoIterator<Item = (Pollutant, PollutantReading)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where the pollutant values of a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingOrigin {
    /// At least one registered provider contributed.
    Measured,
    /// Every provider came back empty; values are the regional estimate.
    Estimated,
    /// Even the estimator produced nothing; fixed conservative values.
    Default,
}

impl ReadingOrigin {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReadingOrigin::Measured => "measured",
            ReadingOrigin::Estimated => "estimated",
            ReadingOrigin::Default => "default",
        }
    }
}

/// Air quality at one coordinate at one moment. Shared behind `Arc` once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedReading {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub location_name: String,
    pub pollutants: PollutantMap,
    pub aqi: AqiResult,
    pub confidence: Confidence,
    /// Contributing providers in priority order.
    pub sources_used: IndexSet<String>,
    pub origin: ReadingOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_profile: Option<RegionProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

impl fmt::Display for AggregatedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.location_name, self.coordinate)?;
        writeln!(f, "observed {}", self.timestamp.format("%Y-%m-%d %H:%M UTC"))?;

        write!(
            f,
            "AQI {} {} ({})",
            self.aqi.value,
            self.aqi.category.label(),
            self.aqi.category.color()
        )?;
        match self.aqi.dominant_pollutant {
            Some(p) => writeln!(f, ", dominant {}", p.label())?,
            None => writeln!(f, ", assumed")?,
        }

        writeln!(
            f,
            "confidence {} (score {})",
            self.confidence.band.label(),
            self.confidence.score
        )?;
        match self.region_profile {
            Some(profile) => writeln!(f, "origin {} ({})", self.origin.as_str(), profile.as_str())?,
            None => writeln!(f, "origin {}", self.origin.as_str())?,
        }
        let sources: Vec<&str> = self.sources_used.iter().map(String::as_str).collect();
        writeln!(f, "sources {}", sources.join(", "))?;

        for (pollutant, reading) in self.pollutants.iter() {
            write!(
                f,
                "  {:<6}{:>9.1} {:<6}",
                pollutant.label(),
                reading.value,
                reading.unit.symbol()
            )?;
            if let Some(assessment) = who_assessment(pollutant, reading.value) {
                write!(f, " WHO {}", assessment.as_str())?;
            }
            writeln!(f)?;
        }

        if let Some(w) = &self.weather {
            writeln!(
                f,
                "weather {:.1}°C, wind {:.1} m/s, humidity {:.0}%",
                w.temperature_c, w.wind_speed_ms, w.humidity_pct
            )?;
        }
        write!(f, "{}", self.aqi.category.health_advice())
    }
}
