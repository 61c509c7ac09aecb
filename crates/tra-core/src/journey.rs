//! Composes direct and one-transfer journeys from timetable segments (§4.10).

use crate::branch_line::TransferTimeResolver;
use crate::models::{JourneyOption, JourneySegment, JourneyType};

/// A candidate transfer: trains terminating at `transfer_station_id` paired
/// against trains departing it.
pub struct TransferLeg {
    pub transfer_station_id: String,
    pub first_leg: Vec<JourneySegment>,
    pub second_leg: Vec<JourneySegment>,
}

#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions {
    pub min_transfer_time: i64,
    pub max_transfer_time: i64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            min_transfer_time: 10,
            max_transfer_time: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Transfers,
    Duration,
    Departure,
    Arrival,
}

/// Parses `"HH:MM"` into minutes since midnight. Malformed input sorts/
/// computes as `0` rather than panicking — timetable strings are
/// upstream-controlled and already validated at decode time.
fn to_minutes(hhmm: &str) -> i64 {
    let mut parts = hhmm.splitn(2, ':');
    let hours: i64 = parts.next().and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i64 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    hours * 60 + minutes
}

/// Minutes from `from` to `to`, applying the overnight rule: a regression
/// of more than 12 hours is treated as crossing midnight (`+24h`); a
/// smaller regression is a missed connection and stays negative so the
/// caller can reject it.
pub fn minutes_between(from: &str, to: &str) -> i64 {
    let mut wait = to_minutes(to) - to_minutes(from);
    if wait < -12 * 60 {
        wait += 24 * 60;
    }
    wait
}

fn direct_duration(segment: &JourneySegment) -> i64 {
    minutes_between(&segment.departure, &segment.arrival)
}

pub struct JourneyPlanner;

impl JourneyPlanner {
    /// Builds every valid `JourneyOption` from a set of direct segments and
    /// a set of transfer legs, without sorting.
    pub fn find_journey_options(
        direct_segments: &[JourneySegment],
        transfer_legs: &[TransferLeg],
        options: PlannerOptions,
        transfer_time_resolver: Option<&TransferTimeResolver>,
    ) -> Vec<JourneyOption> {
        let mut results: Vec<JourneyOption> = direct_segments
            .iter()
            .map(|segment| JourneyOption {
                kind: JourneyType::Direct,
                transfers: 0,
                departure: segment.departure.clone(),
                arrival: segment.arrival.clone(),
                total_duration_min: direct_duration(segment),
                wait_time_min: 0,
                transfer_station_id: None,
                segments: vec![segment.clone()],
            })
            .collect();

        for leg in transfer_legs {
            let effective_min = transfer_time_resolver
                .map(|resolver| resolver.get_min_transfer_time(&leg.transfer_station_id) as i64)
                .unwrap_or(options.min_transfer_time);

            for a in &leg.first_leg {
                for b in &leg.second_leg {
                    let wait = minutes_between(&a.arrival, &b.departure);
                    if wait < effective_min || wait > options.max_transfer_time {
                        continue;
                    }

                    let total = direct_duration(a) + wait + direct_duration(b);
                    results.push(JourneyOption {
                        kind: JourneyType::Transfer,
                        transfers: 1,
                        departure: a.departure.clone(),
                        arrival: b.arrival.clone(),
                        total_duration_min: total,
                        wait_time_min: wait,
                        transfer_station_id: Some(leg.transfer_station_id.clone()),
                        segments: vec![a.clone(), b.clone()],
                    });
                }
            }
        }

        results
    }

    /// Stable ascending sort on a chosen key.
    pub fn sort_journeys(options: &mut [JourneyOption], key: SortKey) {
        match key {
            SortKey::Transfers => options.sort_by_key(|o| o.transfers),
            SortKey::Duration => options.sort_by_key(|o| o.total_duration_min),
            SortKey::Departure => options.sort_by(|a, b| to_minutes(&a.departure).cmp(&to_minutes(&b.departure))),
            SortKey::Arrival => options.sort_by(|a, b| to_minutes(&a.arrival).cmp(&to_minutes(&b.arrival))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(train_no: &str, from: &str, to: &str, dep: &str, arr: &str) -> JourneySegment {
        JourneySegment {
            train_no: train_no.to_string(),
            train_type: "自強".to_string(),
            train_type_code: "1".to_string(),
            from_station_id: from.to_string(),
            from_station_name: from.to_string(),
            to_station_id: to.to_string(),
            to_station_name: to.to_string(),
            departure: dep.to_string(),
            arrival: arr.to_string(),
            bike_flag: None,
            wheel_chair_flag: None,
        }
    }

    #[test]
    fn overnight_rule_matches_spec_examples() {
        assert_eq!(minutes_between("23:30", "00:30"), 60);
        assert_eq!(minutes_between("10:00", "08:00"), -120);
    }

    #[test]
    fn s7_transfer_pairing_matches_spec_scenario() {
        let first_leg = vec![
            segment("201", "A", "T", "07:00", "07:45"),
            segment("203", "A", "T", "07:30", "08:30"),
        ];
        let second_leg = vec![
            segment("301", "T", "B", "08:00", "12:30"),
            segment("303", "T", "B", "09:00", "12:00"),
        ];
        let legs = vec![TransferLeg {
            transfer_station_id: "T".to_string(),
            first_leg,
            second_leg,
        }];

        let options = JourneyPlanner::find_journey_options(
            &[],
            &legs,
            PlannerOptions {
                min_transfer_time: 10,
                max_transfer_time: 120,
            },
            None,
        );

        assert_eq!(options.len(), 3);
        let waits: Vec<i64> = options.iter().map(|o| o.wait_time_min).collect();
        assert!(waits.contains(&15));
        assert!(waits.contains(&75));
        assert!(waits.contains(&30));
        assert!(!waits.contains(&-30));
    }

    #[test]
    fn direct_segment_becomes_zero_transfer_option() {
        let segments = vec![segment("100", "A", "B", "09:00", "11:00")];
        let options = JourneyPlanner::find_journey_options(&segments, &[], PlannerOptions::default(), None);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].transfers, 0);
        assert_eq!(options[0].total_duration_min, 120);
    }

    #[test]
    fn resolver_overrides_fixed_min_transfer_time() {
        let first_leg = vec![segment("1", "A", "T", "07:00", "07:45")];
        let second_leg = vec![segment("2", "T", "B", "08:00", "09:00")];
        let legs = vec![TransferLeg {
            transfer_station_id: "T".to_string(),
            first_leg,
            second_leg,
        }];
        let resolver = TransferTimeResolver::new(vec![("T".to_string(), "X".to_string(), 30)]);

        // Wait is 15 minutes; a resolver requiring 30 rejects the pairing
        // even though the fixed option default (10) would accept it.
        let options = JourneyPlanner::find_journey_options(
            &[],
            &legs,
            PlannerOptions::default(),
            Some(&resolver),
        );
        assert!(options.is_empty());
    }

    #[test]
    fn sort_by_duration_is_ascending() {
        let mut options = vec![
            JourneyOption {
                kind: JourneyType::Direct,
                transfers: 0,
                departure: "08:00".to_string(),
                arrival: "10:00".to_string(),
                total_duration_min: 120,
                wait_time_min: 0,
                transfer_station_id: None,
                segments: vec![],
            },
            JourneyOption {
                kind: JourneyType::Direct,
                transfers: 0,
                departure: "07:00".to_string(),
                arrival: "08:30".to_string(),
                total_duration_min: 90,
                wait_time_min: 0,
                transfer_station_id: None,
                segments: vec![],
            },
        ];
        JourneyPlanner::sort_journeys(&mut options, SortKey::Duration);
        assert_eq!(options[0].total_duration_min, 90);
    }
}
