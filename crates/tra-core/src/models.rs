//! Plain data types shared across the access layer and its domain engines.

use serde::{Deserialize, Serialize};

/// A loaded, immutable station record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// 4-digit station id, e.g. `"1000"`.
    pub id: String,
    /// Canonical unicode name, e.g. `"臺北"`.
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Confidence of a [`crate::station_resolver::StationResolver`] match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    High,
    Medium,
}

/// Filtered view of a timetable row, used by the resolvers and planners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainEntry {
    pub train_no: String,
    pub train_type: String,
    pub train_type_code: String,
    /// `"HH:MM"`.
    pub departure: String,
    /// `"HH:MM"`.
    pub arrival: String,
    pub bike_flag: Option<bool>,
    pub wheel_chair_flag: Option<bool>,
}

/// One leg of a journey: a single train ride between two stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneySegment {
    pub train_no: String,
    pub train_type: String,
    pub train_type_code: String,
    pub from_station_id: String,
    pub from_station_name: String,
    pub to_station_id: String,
    pub to_station_name: String,
    /// `"HH:MM"`.
    pub departure: String,
    /// `"HH:MM"`.
    pub arrival: String,
    pub bike_flag: Option<bool>,
    pub wheel_chair_flag: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyType {
    Direct,
    Transfer,
}

/// A candidate itinerary: either a single direct segment, or two segments
/// joined at a transfer station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyOption {
    #[serde(rename = "type")]
    pub kind: JourneyType,
    pub transfers: u8,
    /// `"HH:MM"` of the first segment's departure.
    pub departure: String,
    /// `"HH:MM"` of the last segment's arrival.
    pub arrival: String,
    pub total_duration_min: i64,
    pub wait_time_min: i64,
    pub transfer_station_id: Option<String>,
    pub segments: Vec<JourneySegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
}

/// A normalized service alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: AlertStatus,
    pub affected_station_ids: Vec<String>,
    pub affected_line_ids: Vec<String>,
    pub alternative_transport: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareOptionType {
    Direct,
    TpassFree,
    TpassPartial,
}

/// One candidate fare for a cross-region TPASS trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareOption {
    #[serde(rename = "type")]
    pub kind: FareOptionType,
    pub transfer_station: Option<String>,
    pub total_fare: u32,
    pub savings: u32,
    pub recommended: bool,
}

/// Junction/branch-line metadata for a single station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchLineInfo {
    pub line_id: String,
    pub junction_station_id: String,
}
