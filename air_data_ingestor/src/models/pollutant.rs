//! The six criteria pollutants tracked by the engine.
//!
//! Declaration order is the tie-break priority (pm25 > pm10 > no2 > o3 > so2 > co),
//! so the derived `Ord` can be used wherever a deterministic ordering is needed.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::unit::ConcentrationUnit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pollutant: {0:?}")]
pub struct UnknownPollutant(pub String);

/// Serialized by [`Pollutant::as_str`]; deserialized through the lenient
/// [`FromStr`] table, so fixtures may use any provider spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Pollutant {
    /// Fine particulate matter (<= 2.5 µm).
    Pm25,
    /// Coarse particulate matter (<= 10 µm).
    Pm10,
    No2,
    O3,
    So2,
    Co,
}

impl Pollutant {
    /// All pollutants in priority order.
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::O3,
        Pollutant::So2,
        Pollutant::Co,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::O3 => "o3",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
        }
    }

    /// Human-facing label, e.g. `PM2.5`.
    pub const fn label(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::O3 => "O3",
            Pollutant::So2 => "SO2",
            Pollutant::Co => "CO",
        }
    }

    /// Unit every value of this pollutant is normalized to.
    pub const fn canonical_unit(&self) -> ConcentrationUnit {
        match self {
            Pollutant::Co => ConcentrationUnit::MilligramsPerCubicMeter,
            _ => ConcentrationUnit::MicrogramsPerCubicMeter,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pollutant {
    type Err = UnknownPollutant;

    /// Accepts the spellings different providers use (`pm2.5`, `PM2_5`, `ozone`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '.' | '_' | '-' | ' '))
            .collect();

        match key.as_str() {
            "pm25" => Ok(Pollutant::Pm25),
            "pm10" => Ok(Pollutant::Pm10),
            "no2" => Ok(Pollutant::No2),
            "o3" | "ozone" => Ok(Pollutant::O3),
            "so2" => Ok(Pollutant::So2),
            "co" => Ok(Pollutant::Co),
            _ => Err(UnknownPollutant(s.to_string())),
        }
    }
}

impl TryFrom<String> for Pollutant {
    type Error = UnknownPollutant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pollutant> for String {
    fn from(pollutant: Pollutant) -> Self {
        pollutant.as_str().to_string()
    }
}
