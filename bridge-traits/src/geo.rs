//! Geocoding bridge.
//!
//! The core never talks to a geocoding service directly. Hosts wrap their
//! platform geocoder (Android `Geocoder`, CoreLocation, a web API) behind
//! [`Geocoder`] and the service layer turns owner home addresses into map
//! pins with it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Forward geocoder.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-form address. `Ok(None)` when the address is unknown.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_zero_for_same_point() {
        let point = Coordinates::new(51.5074, -0.1278);
        assert!(point.distance_km(&point).abs() < 1e-9);
    }

    #[test]
    fn test_distance_london_paris() {
        let london = Coordinates::new(51.5074, -0.1278);
        let paris = Coordinates::new(48.8566, 2.3522);
        let d = london.distance_km(&paris);
        assert!((d - 343.5).abs() < 2.0, "got {d}");
        assert!((paris.distance_km(&london) - d).abs() < 1e-9);
    }

    #[test]
    fn test_validity() {
        assert!(Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
