//! WHO 2021 24-hour guideline comparison.

use air_data_ingestor::Pollutant;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhoAssessment {
    Compliant,
    /// Above the guideline, below twice the guideline.
    Exceedance,
    SignificantExceedance,
}

impl WhoAssessment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            WhoAssessment::Compliant => "compliant",
            WhoAssessment::Exceedance => "exceeds",
            WhoAssessment::SignificantExceedance => "exceeds x2",
        }
    }
}

/// Guideline in the pollutant's canonical unit (CO in mg/m³).
pub const fn who_guideline(pollutant: Pollutant) -> f64 {
    match pollutant {
        Pollutant::Pm25 => 15.0,
        Pollutant::Pm10 => 45.0,
        Pollutant::No2 => 25.0,
        Pollutant::O3 => 100.0,
        Pollutant::So2 => 40.0,
        Pollutant::Co => 4.0,
    }
}

pub fn who_assessment(pollutant: Pollutant, value: f64) -> Option<WhoAssessment> {
    if !value.is_finite() {
        return None;
    }
    let ratio = value / who_guideline(pollutant);
    Some(if ratio <= 1.0 {
        WhoAssessment::Compliant
    } else if ratio <= 2.0 {
        WhoAssessment::Exceedance
    } else {
        WhoAssessment::SignificantExceedance
    })
}
