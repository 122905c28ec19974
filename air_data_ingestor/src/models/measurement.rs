//! A single raw pollutant reading as reported by a provider adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{pollutant::Pollutant, unit::ConcentrationUnit};

/// Data-quality flag carried alongside each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTag {
    /// Reported by the source and passed validation.
    #[default]
    Valid,
    /// Derived by a model or heuristic rather than observed.
    Estimated,
    /// Negative or non-numeric input that was clamped to zero.
    InvalidClamped,
}

/// One pollutant concentration from one source.
///
/// Created by an adapter, consumed once by the normalizer, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub pollutant: Pollutant,
    /// Concentration in `unit`; may be negative or NaN until normalized.
    pub concentration: f64,
    pub unit: ConcentrationUnit,
    /// Name of the provider that produced the value.
    pub source: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub quality: QualityTag,
}

impl Measurement {
    pub fn new(
        pollutant: Pollutant,
        concentration: f64,
        unit: ConcentrationUnit,
        source: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pollutant,
            concentration,
            unit,
            source: source.into(),
            observed_at,
            quality: QualityTag::Valid,
        }
    }

    pub fn with_quality(mut self, quality: QualityTag) -> Self {
        self.quality = quality;
        self
    }
}
