//! Deterministic regional estimate used when no provider has data.
//!
//! Combines an urban/rural classification (within 100 km of a major
//! metropolis), a coarse geographic pollution factor, a seasonal term and a
//! local-solar-time diurnal term. The same coordinate and instant always
//! produce the same values.

use std::f64::consts::PI;

use air_data_ingestor::{Coordinate, Pollutant, QualityTag};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

use crate::reading::{PollutantMap, PollutantReading};

pub const ESTIMATOR_SOURCE: &str = "regional-estimator";
pub const URBAN_RADIUS_KM: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityAnchor {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const fn city(name: &'static str, latitude: f64, longitude: f64) -> CityAnchor {
    CityAnchor {
        name,
        latitude,
        longitude,
    }
}

pub const MAJOR_CITIES: [CityAnchor; 18] = [
    city("New York", 40.7128, -74.0060),
    city("Los Angeles", 34.0522, -118.2437),
    city("Chicago", 41.8781, -87.6298),
    city("Toronto", 43.6532, -79.3832),
    city("London", 51.5074, -0.1278),
    city("Paris", 48.8566, 2.3522),
    city("Berlin", 52.5200, 13.4050),
    city("Rome", 41.9028, 12.4964),
    city("Tokyo", 35.6762, 139.6503),
    city("Beijing", 39.9042, 116.4074),
    city("Shanghai", 31.2304, 121.4737),
    city("Delhi", 28.7041, 77.1025),
    city("São Paulo", -23.5505, -46.6333),
    city("Buenos Aires", -34.6118, -58.3960),
    city("Cairo", 30.0444, 31.2357),
    city("Johannesburg", -26.2041, 28.0473),
    city("Sydney", -33.8688, 151.2093),
    city("Melbourne", -37.8136, 144.9631),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionProfile {
    UrbanHighPollution,
    Urban,
    RuralElevated,
    RuralBackground,
}

impl RegionProfile {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RegionProfile::UrbanHighPollution => "urban_high_pollution",
            RegionProfile::Urban => "urban",
            RegionProfile::RuralElevated => "rural_elevated",
            RegionProfile::RuralBackground => "rural_background",
        }
    }
}

/// Coarse pollution intensity by world region.
pub fn geographic_factor(coordinate: &Coordinate) -> f64 {
    let (lat, lon) = (coordinate.latitude(), coordinate.longitude());
    let within = |lat_lo: f64, lat_hi: f64, lon_lo: f64, lon_hi: f64| {
        (lat_lo..=lat_hi).contains(&lat) && (lon_lo..=lon_hi).contains(&lon)
    };

    if within(20.0, 40.0, 100.0, 140.0) {
        2.0 // East Asia
    } else if within(25.0, 35.0, 45.0, 65.0) {
        1.5 // Middle East
    } else if within(30.0, 50.0, -10.0, 30.0) {
        1.2 // Europe
    } else if within(25.0, 50.0, -125.0, -65.0) {
        1.1 // US / Canada
    } else {
        0.8
    }
}

/// `sin(2π(doy − 80)/365)`: zero at the March equinox, +1 near the June solstice.
pub fn seasonal_term(at: DateTime<Utc>) -> f64 {
    (2.0 * PI * (f64::from(at.ordinal()) - 80.0) / 365.0).sin()
}

/// Hour of day at the coordinate's solar time, in `[0, 24)`.
pub fn local_solar_hour(at: DateTime<Utc>, longitude: f64) -> f64 {
    let utc_hour = f64::from(at.hour()) + f64::from(at.minute()) / 60.0;
    (utc_hour + longitude / 15.0).rem_euclid(24.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub profile: RegionProfile,
    pub nearest_city: Option<&'static str>,
    pub pollutants: PollutantMap,
}

#[derive(Debug, Clone)]
pub struct RegionalEstimator {
    anchors: Vec<CityAnchor>,
    urban_radius_km: f64,
}

impl Default for RegionalEstimator {
    fn default() -> Self {
        Self {
            anchors: MAJOR_CITIES.to_vec(),
            urban_radius_km: URBAN_RADIUS_KM,
        }
    }
}

impl RegionalEstimator {
    pub fn new(anchors: Vec<CityAnchor>, urban_radius_km: f64) -> Self {
        Self {
            anchors,
            urban_radius_km,
        }
    }

    /// Nearest anchor within the urban radius, if any.
    pub fn nearest_city(&self, coordinate: &Coordinate) -> Option<&CityAnchor> {
        self.anchors
            .iter()
            .filter_map(|anchor| {
                let at = Coordinate::new(anchor.latitude, anchor.longitude).ok()?;
                let d = coordinate.distance_km(&at);
                (d <= self.urban_radius_km).then_some((anchor, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(anchor, _)| anchor)
    }

    pub fn profile(&self, coordinate: &Coordinate) -> RegionProfile {
        let urban = self.nearest_city(coordinate).is_some();
        let elevated = geographic_factor(coordinate) >= 1.1;
        match (urban, elevated) {
            (true, true) => RegionProfile::UrbanHighPollution,
            (true, false) => RegionProfile::Urban,
            (false, true) => RegionProfile::RuralElevated,
            (false, false) => RegionProfile::RuralBackground,
        }
    }

    /// Estimated concentrations for all six pollutants, tagged
    /// [`QualityTag::Estimated`]. Never empty.
    pub fn estimate(&self, coordinate: &Coordinate, at: DateTime<Utc>) -> Estimate {
        let nearest = self.nearest_city(coordinate);
        let urban = nearest.is_some();
        let geo = geographic_factor(coordinate);
        let season = seasonal_term(at);
        let hour = (2.0 * PI * local_solar_hour(at, coordinate.longitude()) / 24.0).sin();

        let (base_pm25, base_no2) = if urban {
            (15.0 + geo * 10.0 + season * 5.0, 25.0 + geo * 15.0 + season * 8.0)
        } else {
            (5.0 + geo * 3.0 + season * 2.0, 8.0 + geo * 5.0 + season * 3.0)
        };

        let values = [
            (Pollutant::Pm25, base_pm25 + hour * 3.0),
            (Pollutant::Pm10, base_pm25 * 1.6 + hour * 4.0),
            (Pollutant::No2, base_no2 + hour * 8.0),
            (Pollutant::O3, 45.0 + season * 15.0 - hour * 5.0),
            (Pollutant::So2, 3.0 + geo * 4.0),
            (Pollutant::Co, 0.8 + geo * 0.6),
        ];

        let pollutants = values
            .into_iter()
            .map(|(p, v)| {
                let value = (v.max(0.0) * 100.0).round() / 100.0;
                (p, PollutantReading::new(p, value, ESTIMATOR_SOURCE, QualityTag::Estimated))
            })
            .collect();

        Estimate {
            profile: self.profile(coordinate),
            nearest_city: nearest.map(|c| c.name),
            pollutants,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 21, 12, 0, 0).unwrap()
    }

    #[test]
    fn paris_is_urban_high_pollution() {
        let estimator = RegionalEstimator::default();
        let paris = Coordinate::new(48.8566, 2.3522).unwrap();

        let estimate = estimator.estimate(&paris, noon_utc());
        assert_eq!(estimate.profile, RegionProfile::UrbanHighPollution);
        assert_eq!(estimate.nearest_city, Some("Paris"));

        let pm25 = estimate.pollutants.value(Pollutant::Pm25).unwrap();
        assert!((15.0..=45.0).contains(&pm25), "pm25 = {pm25}");
        assert_eq!(estimate.pollutants.len(), 6);
        assert!(
            estimate
                .pollutants
                .iter()
                .all(|(_, r)| r.quality == QualityTag::Estimated && r.source == ESTIMATOR_SOURCE)
        );
    }

    #[test]
    fn suburbs_within_radius_are_urban() {
        let estimator = RegionalEstimator::default();
        // Versailles, ~17 km from central Paris
        let versailles = Coordinate::new(48.8049, 2.1204).unwrap();
        assert_eq!(estimator.nearest_city(&versailles).map(|c| c.name), Some("Paris"));
        // Orléans, ~110 km away
        let orleans = Coordinate::new(47.9030, 1.9093).unwrap();
        assert_eq!(estimator.profile(&orleans), RegionProfile::RuralElevated);
    }

    #[test]
    fn open_ocean_is_background() {
        let estimator = RegionalEstimator::default();
        let pacific = Coordinate::new(-30.0, -140.0).unwrap();
        let estimate = estimator.estimate(&pacific, noon_utc());
        assert_eq!(estimate.profile, RegionProfile::RuralBackground);
        assert_eq!(estimate.nearest_city, None);
        assert!(estimate.pollutants.value(Pollutant::Pm25).unwrap() < 15.0);
    }

    #[test]
    fn deterministic_for_same_instant() {
        let estimator = RegionalEstimator::default();
        let delhi = Coordinate::new(28.61, 77.21).unwrap();
        assert_eq!(estimator.estimate(&delhi, noon_utc()), estimator.estimate(&delhi, noon_utc()));
    }

    #[test]
    fn solar_hour_wraps() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap();
        assert!((local_solar_hour(at, 15.0) - 0.5).abs() < 1e-9);
        assert!((local_solar_hour(at, -180.0) - 11.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn estimate_is_complete_and_non_negative(
            lat in -90.0..=90.0f64,
            lon in -180.0..=180.0f64,
            secs in 0i64..(400 * 86_400),
        ) {
            let coordinate = Coordinate::new(lat, lon).unwrap();
            let at = Utc.timestamp_opt(1_735_689_600 + secs, 0).unwrap();
            let estimate = RegionalEstimator::default().estimate(&coordinate, at);
            prop_assert_eq!(estimate.pollutants.len(), 6);
            for (_, reading) in estimate.pollutants.iter() {
                prop_assert!(reading.value.is_finite() && reading.value >= 0.0);
            }
        }
    }
}
