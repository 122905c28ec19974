//! US-EPA style piecewise-linear AQI.
//!
//! Each pollutant has a breakpoint table in its canonical unit. The overall
//! AQI is the largest sub-index among pollutants with a positive
//! concentration; ties go to the pollutant earlier in [`Pollutant::ALL`].
//! When nothing positive is present the result is the floor default of 50
//! (Moderate) with [`AqiBasis::AssumedModerate`].

use std::collections::BTreeMap;

use air_data_ingestor::Pollutant;
use serde::Serialize;
use tracing::debug;

use crate::reading::PollutantMap;

/// Index used when no pollutant has a positive concentration.
pub const FLOOR_AQI: u16 = 50;
pub const MAX_AQI: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub aqi_low: u16,
    pub aqi_high: u16,
}

const fn bp(conc_low: f64, conc_high: f64, aqi_low: u16, aqi_high: u16) -> Breakpoint {
    Breakpoint {
        conc_low,
        conc_high,
        aqi_low,
        aqi_high,
    }
}

/// Segments in ascending order. The last segment is open-ended and is
/// interpolated up to `ceiling`, beyond which the index saturates at 500.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointTable {
    pub segments: &'static [Breakpoint],
    pub ceiling: f64,
}

static PM25: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 12.0, 0, 50),
        bp(12.1, 35.4, 51, 100),
        bp(35.5, 55.4, 101, 150),
        bp(55.5, 150.4, 151, 200),
        bp(150.5, 250.4, 201, 300),
        bp(250.5, f64::INFINITY, 301, 500),
    ],
    ceiling: 500.4,
};

static PM10: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 54.0, 0, 50),
        bp(55.0, 154.0, 51, 100),
        bp(155.0, 254.0, 101, 150),
        bp(255.0, 354.0, 151, 200),
        bp(355.0, 424.0, 201, 300),
        bp(425.0, f64::INFINITY, 301, 500),
    ],
    ceiling: 604.0,
};

static NO2: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 25.0, 0, 50),
        bp(25.1, 50.0, 51, 100),
        bp(50.1, 100.0, 101, 150),
        bp(100.1, 200.0, 151, 200),
        bp(200.1, 400.0, 201, 300),
        bp(400.1, f64::INFINITY, 301, 500),
    ],
    ceiling: 800.0,
};

static O3: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 106.0, 0, 50),
        bp(107.0, 137.0, 51, 100),
        bp(138.0, 167.0, 101, 150),
        bp(168.0, 206.0, 151, 200),
        bp(207.0, 392.0, 201, 300),
        bp(393.0, f64::INFINITY, 301, 500),
    ],
    ceiling: 1184.0,
};

static SO2: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 92.0, 0, 50),
        bp(93.0, 197.0, 51, 100),
        bp(198.0, 485.0, 101, 150),
        bp(486.0, 797.0, 151, 200),
        bp(798.0, 1583.0, 201, 300),
        bp(1584.0, f64::INFINITY, 301, 500),
    ],
    ceiling: 2630.0,
};

// mg/m³
static CO: BreakpointTable = BreakpointTable {
    segments: &[
        bp(0.0, 5.0, 0, 50),
        bp(5.1, 10.8, 51, 100),
        bp(10.9, 14.2, 101, 150),
        bp(14.3, 17.6, 151, 200),
        bp(17.7, 34.8, 201, 300),
        bp(34.9, f64::INFINITY, 301, 500),
    ],
    ceiling: 57.7,
};

pub fn breakpoints(pollutant: Pollutant) -> &'static BreakpointTable {
    match pollutant {
        Pollutant::Pm25 => &PM25,
        Pollutant::Pm10 => &PM10,
        Pollutant::No2 => &NO2,
        Pollutant::O3 => &O3,
        Pollutant::So2 => &SO2,
        Pollutant::Co => &CO,
    }
}

impl BreakpointTable {
    /// Sub-index for a concentration, or `None` if it is not positive.
    ///
    /// A concentration that falls in the gap between two segments (e.g.
    /// PM2.5 12.05) is treated as the start of the upper segment.
    pub fn sub_index(&self, concentration: f64) -> Option<u16> {
        if concentration.is_nan() || concentration <= 0.0 {
            return None;
        }

        for (i, seg) in self.segments.iter().enumerate() {
            let last = i + 1 == self.segments.len();
            let high = if last { self.ceiling } else { seg.conc_high };
            if concentration <= high {
                let c = concentration.max(seg.conc_low);
                let span = f64::from(seg.aqi_high - seg.aqi_low);
                let aqi =
                    f64::from(seg.aqi_low) + span * (c - seg.conc_low) / (high - seg.conc_low);
                return Some((aqi.round() as u16).min(MAX_AQI));
            }
        }
        Some(MAX_AQI)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    pub const fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#00E400",
            AqiCategory::Moderate => "#FFFF00",
            AqiCategory::UnhealthyForSensitiveGroups => "#FF7E00",
            AqiCategory::Unhealthy => "#FF0000",
            AqiCategory::VeryUnhealthy => "#8F3F97",
            AqiCategory::Hazardous => "#7E0023",
        }
    }

    pub const fn health_advice(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory; enjoy outdoor activities.",
            AqiCategory::Moderate => {
                "Acceptable air quality. Unusually sensitive people should consider limiting prolonged outdoor exertion."
            }
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Sensitive groups (children, older adults, people with heart or lung disease) should reduce prolonged outdoor exertion."
            }
            AqiCategory::Unhealthy => {
                "Everyone may begin to experience health effects; sensitive groups should avoid prolonged outdoor exertion."
            }
            AqiCategory::VeryUnhealthy => {
                "Health alert: everyone should avoid prolonged outdoor exertion; sensitive groups should remain indoors."
            }
            AqiCategory::Hazardous => {
                "Emergency conditions: everyone should avoid all outdoor activity."
            }
        }
    }
}

/// Whether the index was derived from data or is the floor default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AqiBasis {
    Measured,
    AssumedModerate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiResult {
    pub value: u16,
    pub category: AqiCategory,
    pub color: &'static str,
    /// `None` only for the floor default.
    pub dominant_pollutant: Option<Pollutant>,
    pub sub_indices: BTreeMap<Pollutant, u16>,
    pub basis: AqiBasis,
}

impl AqiResult {
    fn floor() -> Self {
        let category = AqiCategory::from_aqi(FLOOR_AQI);
        Self {
            value: FLOOR_AQI,
            category,
            color: category.color(),
            dominant_pollutant: None,
            sub_indices: BTreeMap::new(),
            basis: AqiBasis::AssumedModerate,
        }
    }

    pub fn sub_index(&self, pollutant: Pollutant) -> Option<u16> {
        self.sub_indices.get(&pollutant).copied()
    }
}

pub fn compute_aqi(pollutants: &PollutantMap) -> AqiResult {
    let sub_indices: BTreeMap<Pollutant, u16> = pollutants
        .iter()
        .filter_map(|(p, reading)| breakpoints(p).sub_index(reading.value).map(|i| (p, i)))
        .collect();

    // BTreeMap order is priority order, so a strict `>` keeps the earlier pollutant on ties.
    let mut dominant: Option<(Pollutant, u16)> = None;
    for (&pollutant, &index) in &sub_indices {
        match dominant {
            Some((_, best)) if index <= best => {}
            _ => dominant = Some((pollutant, index)),
        }
    }

    let Some((pollutant, value)) = dominant else {
        debug!(pollutants = pollutants.len(), "no positive concentration; assuming moderate");
        return AqiResult::floor();
    };

    let category = AqiCategory::from_aqi(value);
    AqiResult {
        value,
        category,
        color: category.color(),
        dominant_pollutant: Some(pollutant),
        sub_indices,
        basis: AqiBasis::Measured,
    }
}
