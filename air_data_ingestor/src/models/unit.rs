use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown concentration unit: {0:?}")]
pub struct UnknownUnit(pub String);

/// Units providers report concentrations in.
///
/// Serialized as the short ASCII symbol (`ug/m3`, `ppb`, `molecules/cm2`, ...);
/// parsing is lenient about `µ`/`μ`, superscripts and case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConcentrationUnit {
    MicrogramsPerCubicMeter,
    MilligramsPerCubicMeter,
    PartsPerBillion,
    PartsPerMillion,
    /// Tropospheric column density reported by satellite instruments.
    MoleculesPerSquareCm,
    /// Total ozone column.
    DobsonUnits,
}

impl ConcentrationUnit {
    pub const fn ascii(&self) -> &'static str {
        match self {
            ConcentrationUnit::MicrogramsPerCubicMeter => "ug/m3",
            ConcentrationUnit::MilligramsPerCubicMeter => "mg/m3",
            ConcentrationUnit::PartsPerBillion => "ppb",
            ConcentrationUnit::PartsPerMillion => "ppm",
            ConcentrationUnit::MoleculesPerSquareCm => "molecules/cm2",
            ConcentrationUnit::DobsonUnits => "du",
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            ConcentrationUnit::MicrogramsPerCubicMeter => "µg/m³",
            ConcentrationUnit::MilligramsPerCubicMeter => "mg/m³",
            ConcentrationUnit::PartsPerBillion => "ppb",
            ConcentrationUnit::PartsPerMillion => "ppm",
            ConcentrationUnit::MoleculesPerSquareCm => "molecules/cm²",
            ConcentrationUnit::DobsonUnits => "DU",
        }
    }
}

impl fmt::Display for ConcentrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ConcentrationUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                'µ' | 'μ' => 'u',
                '³' => '3',
                '²' => '2',
                other => other,
            })
            .collect();

        match key.as_str() {
            "ug/m3" => Ok(ConcentrationUnit::MicrogramsPerCubicMeter),
            "mg/m3" => Ok(ConcentrationUnit::MilligramsPerCubicMeter),
            "ppb" => Ok(ConcentrationUnit::PartsPerBillion),
            "ppm" => Ok(ConcentrationUnit::PartsPerMillion),
            "molecules/cm2" | "molec/cm2" => Ok(ConcentrationUnit::MoleculesPerSquareCm),
            "du" | "dobson" => Ok(ConcentrationUnit::DobsonUnits),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}

impl TryFrom<String> for ConcentrationUnit {
    type Error = UnknownUnit;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConcentrationUnit> for String {
    fn from(unit: ConcentrationUnit) -> Self {
        unit.ascii().to_string()
    }
}
