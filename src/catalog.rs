use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

use crate::geo::{nearest_station, Coordinate};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read station catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse station catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Station catalog is empty")]
    Empty,
}

/// A real-time buoy station. Also used as the tide-prediction station id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuoyStation {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl BuoyStation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Fixed, ordered station list. Loaded once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: Vec<BuoyStation>,
}

// (id, name, latitude, longitude)
const BUILTIN_STATIONS: &[(&str, &str, f64, f64)] = &[
    ("46221", "Santa Monica Bay", 33.860, -118.641),
    ("46222", "San Pedro", 33.618, -118.317),
    ("46253", "San Pedro South", 33.576, -118.181),
    ("46025", "Santa Monica Basin", 33.755, -119.045),
    ("46224", "Oceanside Offshore", 33.178, -117.472),
    ("46225", "Torrey Pines Outer", 32.933, -117.391),
    ("46232", "Point Loma South", 32.517, -117.425),
    ("46086", "San Clemente Basin", 32.499, -118.052),
    ("46053", "East Santa Barbara", 34.241, -119.839),
    ("46054", "West Santa Barbara", 34.274, -120.468),
    ("46011", "Santa Maria", 34.956, -121.019),
    ("46042", "Monterey", 36.785, -122.396),
    ("46012", "Half Moon Bay", 37.356, -122.881),
    ("46026", "San Francisco", 37.754, -122.839),
];

impl StationCatalog {
    pub fn new(stations: Vec<BuoyStation>) -> Self {
        Self { stations }
    }

    pub fn builtin() -> Self {
        let stations = BUILTIN_STATIONS
            .iter()
            .map(|(id, name, latitude, longitude)| BuoyStation {
                id: id.to_string(),
                name: name.to_string(),
                latitude: *latitude,
                longitude: *longitude,
            })
            .collect();
        Self { stations }
    }

    /// Load a replacement catalog from a JSON array of stations
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let stations: Vec<BuoyStation> = serde_json::from_str(&raw)?;
        if stations.is_empty() {
            return Err(CatalogError::Empty);
        }
        info!("Loaded {} stations from catalog file", stations.len());
        Ok(Self { stations })
    }

    pub fn stations(&self) -> &[BuoyStation] {
        &self.stations
    }

    pub fn nearest(&self, point: Coordinate) -> Option<&BuoyStation> {
        nearest_station(point, &self.stations)
    }
}

/// A named surf break
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfSpot {
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone)]
pub struct SpotCatalog {
    spots: Vec<SurfSpot>,
}

const BUILTIN_SPOTS: &[(&str, f64, f64)] = &[
    ("Malibu Surfrider", 34.0353, -118.6787),
    ("Zuma Beach", 34.0155, -118.8226),
    ("Venice Breakwater", 33.9850, -118.4764),
    ("El Porto", 33.8992, -118.4196),
    ("Huntington Beach Pier", 33.6553, -118.0050),
    ("Newport Wedge", 33.5930, -117.8820),
    ("Lower Trestles", 33.3822, -117.5886),
    ("Oceanside Pier", 33.1936, -117.3863),
    ("Swamis", 33.0345, -117.2926),
    ("Blacks Beach", 32.8894, -117.2533),
    ("Windansea", 32.8300, -117.2817),
    ("Ocean Beach San Diego", 32.7486, -117.2530),
    ("Rincon", 34.3733, -119.4783),
    ("Pismo Beach Pier", 35.1386, -120.6439),
    ("Steamer Lane", 36.9515, -122.0262),
    ("Mavericks", 37.4925, -122.5015),
    ("Ocean Beach San Francisco", 37.7594, -122.5107),
];

impl SpotCatalog {
    pub fn new(spots: Vec<SurfSpot>) -> Self {
        Self { spots }
    }

    pub fn builtin() -> Self {
        let spots = BUILTIN_SPOTS
            .iter()
            .map(|(name, latitude, longitude)| SurfSpot {
                name: name.to_string(),
                coordinate: Coordinate::new(*latitude, *longitude),
            })
            .collect();
        Self { spots }
    }

    /// Case-insensitive lookup by spot name
    pub fn resolve(&self, name: &str) -> Option<&SurfSpot> {
        let wanted = name.trim();
        self.spots
            .iter()
            .find(|spot| spot.name.eq_ignore_ascii_case(wanted))
    }

    pub fn spots(&self) -> &[SurfSpot] {
        &self.spots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_station_ids_are_unique() {
        let catalog = StationCatalog::builtin();
        let mut ids: Vec<_> = catalog.stations().iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.stations().len());
    }

    #[test]
    fn test_nearest_station_for_malibu_is_santa_monica_bay() {
        let stations = StationCatalog::builtin();
        let spots = SpotCatalog::builtin();
        let malibu = spots.resolve("Malibu Surfrider").unwrap();
        let station = stations.nearest(malibu.coordinate).unwrap();
        assert_eq!(station.id, "46221");
    }

    #[test]
    fn test_spot_resolution_is_case_insensitive() {
        let spots = SpotCatalog::builtin();
        assert!(spots.resolve("  lower trestles ").is_some());
        assert!(spots.resolve("Pipeline").is_none());
    }

    #[test]
    fn test_from_json_file_rejects_empty_catalog() {
        let path = std::env::temp_dir().join("surf_report_empty_catalog.json");
        std::fs::write(&path, "[]").unwrap();
        let result = StationCatalog::from_json_file(&path);
        assert!(matches!(result, Err(CatalogError::Empty)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_json_file_keeps_order() {
        let path = std::env::temp_dir().join("surf_report_catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"1","name":"One","latitude":1.0,"longitude":1.0},
               {"id":"2","name":"Two","latitude":2.0,"longitude":2.0}]"#,
        )
        .unwrap();
        let catalog = StationCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.stations()[0].id, "1");
        assert_eq!(catalog.stations()[1].id, "2");
        std::fs::remove_file(&path).ok();
    }
}
