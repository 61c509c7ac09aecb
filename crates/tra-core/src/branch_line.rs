//! Branch-line/junction mapping and minimum inter-platform transfer times.
//!
//! Both tables are loaded once from upstream payloads (`LineTransfer` and
//! `StationOfLine` for the six branch lines) and treated as read-only data
//! for the rest of the process lifetime (§5, "load-once, read-only").

use crate::models::BranchLineInfo;
use std::collections::HashMap;

/// The six TRA branch lines the matcher (§4.11) needs special-cased.
pub const BRANCH_LINES: [&str; 6] = ["PX", "SA", "JJ", "NW", "LJ", "SH"];

const DEFAULT_TRANSFER_MINUTES: u32 = 10;

/// Maps branch-line stations to their main-line junction; `None` for
/// junction stations themselves and for ordinary main-line stations.
pub struct BranchLineResolver {
    /// branch station id -> (line id, junction station id)
    station_to_junction: HashMap<String, (String, String)>,
    junction_ids: Vec<String>,
}

impl BranchLineResolver {
    /// `stations_of_line` maps a branch line id to its ordered station ids,
    /// where the first entry is conventionally the main-line junction.
    pub fn new(stations_of_line: HashMap<String, Vec<String>>) -> Self {
        let mut station_to_junction = HashMap::new();
        let mut junction_ids = Vec::new();

        for (line_id, stations) in stations_of_line {
            if !BRANCH_LINES.contains(&line_id.as_str()) {
                continue;
            }
            let Some(junction) = stations.first().cloned() else {
                continue;
            };
            junction_ids.push(junction.clone());
            for station in stations.iter().skip(1) {
                station_to_junction.insert(station.clone(), (line_id.clone(), junction.clone()));
            }
        }

        junction_ids.sort();
        junction_ids.dedup();

        Self {
            station_to_junction,
            junction_ids,
        }
    }

    pub fn is_branch_line_station(&self, station_id: &str) -> bool {
        self.station_to_junction.contains_key(station_id)
    }

    /// `None` for junction stations and ordinary main-line stations; `Some`
    /// for a branch-line station that feeds into that junction.
    pub fn get_junction_station(&self, station_id: &str) -> Option<&str> {
        self.station_to_junction
            .get(station_id)
            .map(|(_, junction)| junction.as_str())
    }

    pub fn get_branch_line_info(&self, station_id: &str) -> Option<BranchLineInfo> {
        self.station_to_junction
            .get(station_id)
            .map(|(line_id, junction)| BranchLineInfo {
                line_id: line_id.clone(),
                junction_station_id: junction.clone(),
            })
    }

    pub fn get_all_junction_stations(&self) -> &[String] {
        &self.junction_ids
    }
}

/// Minimum minutes needed to change trains at a station, keyed by station
/// id; symmetric by construction (§4.9, "data is symmetric").
pub struct TransferTimeResolver {
    by_station: HashMap<String, u32>,
}

impl TransferTimeResolver {
    /// `line_transfers` is the raw `{from, to, min_transfer_time}` payload;
    /// both directions of a pair resolve to the same value regardless of
    /// which side of the pair the payload lists.
    pub fn new(line_transfers: Vec<(String, String, u32)>) -> Self {
        let mut by_station = HashMap::new();
        for (from, _to, minutes) in &line_transfers {
            by_station
                .entry(from.clone())
                .and_modify(|m: &mut u32| *m = (*m).min(*minutes))
                .or_insert(*minutes);
        }
        for (_from, to, minutes) in &line_transfers {
            by_station
                .entry(to.clone())
                .and_modify(|m: &mut u32| *m = (*m).min(*minutes))
                .or_insert(*minutes);
        }
        Self { by_station }
    }

    /// Default of 10 minutes if the station has no recorded entry.
    pub fn get_min_transfer_time(&self, station_id: &str) -> u32 {
        self.by_station
            .get(station_id)
            .copied()
            .unwrap_or(DEFAULT_TRANSFER_MINUTES)
    }

    /// The minimum transfer time between a pair is simply the larger
    /// station-side requirement, since the data is symmetric per-station
    /// rather than per-pair in this simplified model.
    pub fn get_transfer_time_between(&self, a: &str, b: &str) -> u32 {
        self.get_min_transfer_time(a).max(self.get_min_transfer_time(b))
    }
}
