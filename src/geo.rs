use serde::{Deserialize, Serialize};

use crate::catalog::BuoyStation;

/// Mean Earth radius used by the Haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two coordinates in kilometers
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Nearest station to `point` by Haversine distance.
///
/// Linear scan; on equal distances the first station in catalog order wins.
/// Returns `None` only for an empty catalog.
pub fn nearest_station(point: Coordinate, catalog: &[BuoyStation]) -> Option<&BuoyStation> {
    let mut best: Option<(&BuoyStation, f64)> = None;

    for station in catalog {
        let distance = distance_km(point, station.coordinate());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((station, distance)),
        }
    }

    best.map(|(station, _)| station)
}
