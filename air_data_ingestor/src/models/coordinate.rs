//! Validated geographic coordinates and rectangular coverage regions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Reasons a latitude/longitude pair is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("coordinate components must be finite numbers")]
    NotFinite,
}

/// A WGS84 point. Construction always validates, so holding a `Coordinate`
/// means the pair is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Validates and builds a coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}, {:.3}", self.latitude, self.longitude)
    }
}

/// Axis-aligned lat/lon rectangle, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub const fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// True when `coordinate` lies inside the box (edges included).
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.lat_min..=self.lat_max).contains(&coordinate.latitude())
            && (self.lon_min..=self.lon_max).contains(&coordinate.longitude())
    }

    /// Min <= max on both axes and every bound inside the valid ranges.
    pub fn is_well_formed(&self) -> bool {
        self.lat_min <= self.lat_max
            && self.lon_min <= self.lon_max
            && Coordinate::new(self.lat_min, self.lon_min).is_ok()
            && Coordinate::new(self.lat_max, self.lon_max).is_ok()
    }

    /// The overlap of two boxes. Disjoint boxes give an inverted box that
    /// contains nothing.
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.lat_min.max(other.lat_min),
            self.lat_max.min(other.lat_max),
            self.lon_min.max(other.lon_min),
            self.lon_max.min(other.lon_max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.1),
            Err(CoordinateError::LongitudeOutOfRange(-180.1))
        );
        assert_eq!(Coordinate::new(f64::NAN, 0.0), Err(CoordinateError::NotFinite));
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude": 48.8566, "longitude": 2.3522}"#)
            .unwrap();
        assert_eq!(ok.latitude(), 48.8566);

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 120.0, "longitude": 0.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn haversine_paris_london() {
        let paris = Coordinate::new(48.8566, 2.3522).unwrap();
        let london = Coordinate::new(51.5074, -0.1278).unwrap();
        let d = paris.distance_km(&london);
        assert!((d - 343.5).abs() < 2.0, "got {d}");
        assert_eq!(paris.distance_km(&paris), 0.0);
    }

    #[test]
    fn bounding_box_edges_are_inclusive() {
        let bbox = BoundingBox::new(15.0, 70.0, -140.0, -40.0);
        assert!(bbox.contains(&Coordinate::new(15.0, -140.0).unwrap()));
        assert!(bbox.contains(&Coordinate::new(70.0, -40.0).unwrap()));
        assert!(!bbox.contains(&Coordinate::new(10.0, 0.0).unwrap()));
        assert!(bbox.is_well_formed());
        assert!(!BoundingBox::new(70.0, 15.0, -140.0, -40.0).is_well_formed());
    }

    #[test]
    fn intersection_of_boxes() {
        let na = BoundingBox::new(15.0, 70.0, -140.0, -40.0);
        let overlap = na.intersect(&BoundingBox::new(0.0, 30.0, -100.0, 10.0));
        assert_eq!(overlap, BoundingBox::new(15.0, 30.0, -100.0, -40.0));

        let europe = na.intersect(&BoundingBox::new(35.0, 70.0, -10.0, 40.0));
        assert!(!europe.is_well_formed());
        assert!(!europe.contains(&Coordinate::new(48.85, 2.35).unwrap()));
    }
}
