//! Branch-line-aware hybrid query strategy (§4.11): when at least one
//! endpoint of an OD pair is a branch-line station, no OD timetable
//! endpoint exists, so we intersect both stations' daily timetables by
//! train number instead.

use crate::journey::minutes_between;
use crate::models::{JourneySegment, TrainEntry};
use std::collections::HashMap;

pub struct StationTimetableMatcher;

impl StationTimetableMatcher {
    /// `origin_timetable`/`destination_timetable` are each station's full
    /// daily timetable. A pair of rows sharing a `train_no` becomes a
    /// `JourneySegment` iff the origin's departure precedes the
    /// destination's arrival under the overnight rule; same-day
    /// regressions are the train running in the opposite direction and are
    /// rejected. Output is sorted by departure time.
    pub fn match_segments(
        origin_id: &str,
        origin_name: &str,
        destination_id: &str,
        destination_name: &str,
        origin_timetable: &[TrainEntry],
        destination_timetable: &[TrainEntry],
    ) -> Vec<JourneySegment> {
        let by_train: HashMap<&str, &TrainEntry> = destination_timetable
            .iter()
            .map(|entry| (entry.train_no.as_str(), entry))
            .collect();

        let mut segments: Vec<JourneySegment> = origin_timetable
            .iter()
            .filter_map(|origin_entry| {
                let destination_entry = by_train.get(origin_entry.train_no.as_str())?;
                if !Self::validate_train_direction(&origin_entry.departure, &destination_entry.arrival) {
                    return None;
                }
                Some(JourneySegment {
                    train_no: origin_entry.train_no.clone(),
                    train_type: origin_entry.train_type.clone(),
                    train_type_code: origin_entry.train_type_code.clone(),
                    from_station_id: origin_id.to_string(),
                    from_station_name: origin_name.to_string(),
                    to_station_id: destination_id.to_string(),
                    to_station_name: destination_name.to_string(),
                    departure: origin_entry.departure.clone(),
                    arrival: destination_entry.arrival.clone(),
                    bike_flag: origin_entry.bike_flag,
                    wheel_chair_flag: origin_entry.wheel_chair_flag,
                })
            })
            .collect();

        segments.sort_by_key(|s| departure_minutes(&s.departure));
        segments
    }

    /// `true` if `arrival` is reachable from `departure` under the
    /// overnight rule: a pre-dawn arrival after a late-night departure is a
    /// valid overnight run, while a same-day regression means the matched
    /// row runs the opposite direction.
    fn validate_train_direction(departure: &str, arrival: &str) -> bool {
        minutes_between(departure, arrival) > 0
    }
}

fn departure_minutes(hhmm: &str) -> i64 {
    let mut parts = hhmm.splitn(2, ':');
    let hours: i64 = parts.next().and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i64 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    hours * 60 + minutes
}
