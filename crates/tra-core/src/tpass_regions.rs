//! Static TPASS region membership table (§4.13, GLOSSARY "TPASS").
//!
//! The TDX API (§6.1) exposes no region endpoint: which stations belong to
//! a TPASS holder's home region, and which of those are the boundary
//! stations along the direction of travel leaving it, is operator
//! configuration rather than upstream data. This module ships a small
//! built-in seed and is meant to be extended the same way the station
//! resolver's nickname/correction tables are (§3): loaded once, read-only
//! for the process lifetime.

use std::collections::HashMap;

/// One TPASS region: its id, member stations, and the subset of those
/// members that sit at the region's edge along the direction of travel
/// leaving it.
pub struct TpassRegion {
    pub id: String,
    pub member_station_ids: Vec<String>,
    pub boundary_station_ids: Vec<String>,
}

/// Read-only lookup over a fixed set of [`TpassRegion`]s.
pub struct TpassRegionTable {
    regions: Vec<TpassRegion>,
    station_to_region: HashMap<String, usize>,
}

impl TpassRegionTable {
    pub fn new(regions: Vec<TpassRegion>) -> Self {
        let mut station_to_region = HashMap::new();
        for (idx, region) in regions.iter().enumerate() {
            for station_id in &region.member_station_ids {
                station_to_region.insert(station_id.clone(), idx);
            }
        }
        Self {
            regions,
            station_to_region,
        }
    }

    /// Built-in seed covering the region used in the worked example (§8 S8):
    /// `kpnt` (基北北桃 — Keelung/Taipei/New Taipei/Taoyuan).
    pub fn builtin() -> Self {
        Self::new(vec![TpassRegion {
            id: "kpnt".to_string(),
            member_station_ids: vec!["1000".to_string(), "1100".to_string(), "1080".to_string()],
            boundary_station_ids: vec!["1100".to_string(), "1080".to_string()],
        }])
    }

    pub fn region_of(&self, station_id: &str) -> Option<&str> {
        self.station_to_region
            .get(station_id)
            .map(|&idx| self.regions[idx].id.as_str())
    }

    pub fn same_region(&self, a: &str, b: &str) -> bool {
        matches!(
            (self.station_to_region.get(a), self.station_to_region.get(b)),
            (Some(ra), Some(rb)) if ra == rb
        )
    }

    /// Boundary stations of `station_id`'s region, in the order configured;
    /// empty if the station belongs to no known region.
    pub fn boundary_stations_for(&self, station_id: &str) -> Vec<String> {
        self.station_to_region
            .get(station_id)
            .map(|&idx| self.regions[idx].boundary_station_ids.clone())
            .unwrap_or_default()
    }
}

impl Default for TpassRegionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_resolves_to_its_region() {
        let table = TpassRegionTable::builtin();
        assert_eq!(table.region_of("1000"), Some("kpnt"));
        assert_eq!(table.region_of("9999"), None);
    }

    #[test]
    fn same_region_requires_both_sides_known_and_equal() {
        let table = TpassRegionTable::builtin();
        assert!(table.same_region("1000", "1100"));
        assert!(!table.same_region("1000", "1150"));
        assert!(!table.same_region("1000", "9999"));
    }

    #[test]
    fn boundary_stations_are_empty_outside_any_region() {
        let table = TpassRegionTable::builtin();
        assert_eq!(table.boundary_stations_for("9999"), Vec::<String>::new());
        assert_eq!(table.boundary_stations_for("1000"), vec!["1100".to_string(), "1080".to_string()]);
    }
}
