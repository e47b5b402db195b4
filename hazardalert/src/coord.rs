//! Coordinates and great-circle distance.
#[cfg(feature = "geo")]
use geo::{point, Point};
use serde::{Deserialize, Serialize};

/// Earth radius used by [`distance_meters`] (meters).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude, `-90..=90`.
    pub latitude: f64,
    /// Longitude, `-180..=180`.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate. Ranges are not validated.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Convert into a `geo` point (`x` is longitude).
    #[must_use]
    #[cfg(feature = "geo")]
    #[cfg_attr(docsrs, doc(cfg(feature = "geo")))]
    pub fn to_point(&self) -> Point<f64> {
        point! { x: self.longitude, y: self.latitude }
    }
}

#[cfg(feature = "geo")]
impl From<Point<f64>> for Coordinate {
    fn from(p: Point<f64>) -> Self {
        Self::new(p.y(), p.x())
    }
}

/// Haversine distance between two points given in degrees.
///
/// Inputs outside the valid degree ranges are not checked; the result is
/// whatever the formula produces for them.
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.).sin().powi(2);
    // rounding can push `a` slightly past 1 for antipodal points
    let c = 2. * a.sqrt().min(1.).asin();

    EARTH_RADIUS_METERS * c
}
