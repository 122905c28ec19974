//! Converts raw provider measurements to canonical units and folds them into
//! a [`PollutantMap`].
//!
//! Canonical units are µg/m³ for everything except CO, which is mg/m³.
//! Non-finite or negative inputs are clamped to zero and tagged
//! [`QualityTag::InvalidClamped`]; a unit with no known conversion for the
//! pollutant is dropped with a warning.

use std::collections::BTreeMap;

use air_data_ingestor::{ConcentrationUnit, Measurement, Pollutant, QualityTag};
use tracing::warn;

use crate::reading::{PollutantMap, PollutantReading};

use ConcentrationUnit::*;
use Pollutant::*;

/// Multiplier from `(pollutant, unit)` to the pollutant's canonical unit.
const CONVERSIONS: &[(Pollutant, ConcentrationUnit, f64)] = &[
    (Pm25, MicrogramsPerCubicMeter, 1.0),
    (Pm25, MilligramsPerCubicMeter, 1000.0),
    (Pm10, MicrogramsPerCubicMeter, 1.0),
    (Pm10, MilligramsPerCubicMeter, 1000.0),
    (No2, MicrogramsPerCubicMeter, 1.0),
    (No2, MilligramsPerCubicMeter, 1000.0),
    (No2, PartsPerBillion, 1.88),
    (No2, PartsPerMillion, 1880.0),
    // tropospheric column to approximate surface concentration
    (No2, MoleculesPerSquareCm, 1.9e-9),
    (O3, MicrogramsPerCubicMeter, 1.0),
    (O3, MilligramsPerCubicMeter, 1000.0),
    (O3, PartsPerBillion, 1.96),
    (O3, PartsPerMillion, 1960.0),
    (O3, DobsonUnits, 2.14),
    (So2, MicrogramsPerCubicMeter, 1.0),
    (So2, MilligramsPerCubicMeter, 1000.0),
    (So2, PartsPerBillion, 2.62),
    (So2, PartsPerMillion, 2620.0),
    (Co, MilligramsPerCubicMeter, 1.0),
    (Co, MicrogramsPerCubicMeter, 0.001),
    (Co, PartsPerMillion, 1.145),
    (Co, PartsPerBillion, 0.001145),
];

pub fn conversion_factor(pollutant: Pollutant, unit: ConcentrationUnit) -> Option<f64> {
    CONVERSIONS
        .iter()
        .find(|(p, u, _)| *p == pollutant && *u == unit)
        .map(|(_, _, factor)| *factor)
}

/// One measurement after conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub pollutant: Pollutant,
    pub value: f64,
    pub quality: QualityTag,
}

/// Converts a single measurement, or `None` if its unit cannot be converted.
pub fn normalize_measurement(measurement: &Measurement) -> Option<Normalized> {
    let factor = conversion_factor(measurement.pollutant, measurement.unit)?;
    let converted = measurement.concentration * factor;

    let (value, quality) = if converted.is_finite() && converted >= 0.0 {
        (converted, measurement.quality)
    } else {
        (0.0, QualityTag::InvalidClamped)
    };

    Some(Normalized {
        pollutant: measurement.pollutant,
        value,
        quality,
    })
}

#[derive(Default)]
struct Accumulator<'a> {
    source: &'a str,
    sum: f64,
    count: u32,
    estimated: bool,
    clamped: u32,
}

/// Normalizes a provider's batch into one reading per pollutant.
///
/// Several values for the same pollutant are averaged. Clamped values are
/// left out of the average (it is 0 if nothing valid remains) but mark the
/// result [`QualityTag::InvalidClamped`].
pub fn normalize(measurements: &[Measurement]) -> PollutantMap {
    let mut acc: BTreeMap<Pollutant, Accumulator<'_>> = BTreeMap::new();

    for measurement in measurements {
        let Some(normalized) = normalize_measurement(measurement) else {
            warn!(
                pollutant = %measurement.pollutant,
                unit = %measurement.unit,
                source = %measurement.source,
                "no conversion for unit; dropping measurement"
            );
            continue;
        };

        let slot = acc.entry(normalized.pollutant).or_insert_with(|| Accumulator {
            source: &measurement.source,
            ..Default::default()
        });
        match normalized.quality {
            QualityTag::InvalidClamped => slot.clamped += 1,
            quality => {
                slot.sum += normalized.value;
                slot.count += 1;
                slot.estimated |= quality == QualityTag::Estimated;
            }
        }
    }

    acc.into_iter()
        .map(|(pollutant, slot)| {
            let value = if slot.count > 0 {
                slot.sum / f64::from(slot.count)
            } else {
                0.0
            };
            let quality = if slot.clamped > 0 {
                QualityTag::InvalidClamped
            } else if slot.estimated {
                QualityTag::Estimated
            } else {
                QualityTag::Valid
            };
            (pollutant, PollutantReading::new(pollutant, value, slot.source, quality))
        })
        .collect()
}
