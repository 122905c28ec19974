//! Reliability rating for an aggregated reading.
//!
//! The score (0-100) rewards a specialty provider contributing (+40), a
//! ground-network provider contributing (+30), and coverage of the three key
//! pollutants PM2.5, NO2 and O3 (+10 each).

use air_data_ingestor::Pollutant;
use serde::Serialize;

use crate::{cascade::ProviderClass, reading::PollutantMap};

const SPECIALTY_POINTS: u8 = 40;
const GROUND_POINTS: u8 = 30;
const KEY_POLLUTANT_POINTS: u8 = 10;

pub const KEY_POLLUTANTS: [Pollutant; 3] = [Pollutant::Pm25, Pollutant::No2, Pollutant::O3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceBand {
    pub const fn from_score(score: u8) -> Self {
        match score {
            80.. => ConfidenceBand::VeryHigh,
            60..=79 => ConfidenceBand::High,
            40..=59 => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::VeryHigh => "Excellent",
            ConfidenceBand::High => "Good",
            ConfidenceBand::Medium => "Fair",
            ConfidenceBand::Low => "Limited",
        }
    }

    /// Starting confidence for a forecast seeded with a reading of this band.
    pub const fn forecast_base(&self) -> f64 {
        match self {
            ConfidenceBand::VeryHigh => 0.95,
            ConfidenceBand::High => 0.85,
            ConfidenceBand::Medium => 0.70,
            ConfidenceBand::Low => 0.55,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confidence {
    pub band: ConfidenceBand,
    pub score: u8,
}

impl Confidence {
    pub const fn from_score(score: u8) -> Self {
        Self {
            band: ConfidenceBand::from_score(score),
            score,
        }
    }

    pub const fn low() -> Self {
        Self::from_score(0)
    }
}

/// What the scorer needs to know about a provider that contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub class: ProviderClass,
    /// The provider is the designated specialist for a pollutant it supplied.
    pub specialty: bool,
}

pub fn score<I>(contributions: I, pollutants: &PollutantMap) -> Confidence
where
    I: IntoIterator<Item = Contribution>,
{
    let (mut specialty, mut ground) = (false, false);
    for c in contributions {
        specialty |= c.specialty;
        ground |= c.class == ProviderClass::GroundNetwork;
    }

    let key_present = KEY_POLLUTANTS.iter().filter(|p| pollutants.contains(**p)).count() as u8;

    let mut total = key_present * KEY_POLLUTANT_POINTS;
    if specialty {
        total += SPECIALTY_POINTS;
    }
    if ground {
        total += GROUND_POINTS;
    }
    Confidence::from_score(total.min(100))
}
