//! Deterministic cache key construction (§6.3). Keys are plain ASCII
//! strings with no whitespace; [`crate::cache_store::CacheStore`] maps
//! anything outside the filesystem-safe set to a hashed filename.

pub fn od(from: &str, to: &str, date: &str) -> String {
    format!("timetable/od-{from}-{to}-{date}")
}

pub fn train(train_no: &str) -> String {
    format!("timetable/train-{train_no}")
}

pub fn station(station_id: &str, date: &str, direction: Option<&str>) -> String {
    match direction {
        Some(dir) => format!("timetable/station-{station_id}-{date}-{dir}"),
        None => format!("timetable/station-{station_id}-{date}"),
    }
}

pub fn fare_od(from: &str, to: &str) -> String {
    format!("fare/od-{from}-{to}")
}

pub const STATIONS_ALL: &str = "stations/all";

pub const LINES_ALL: &str = "lines/all";

pub fn lines_stations(line_id: &str) -> String {
    format!("lines/stations-{line_id}")
}

pub const LINES_TRANSFERS: &str = "lines/transfers";

pub fn stations_exits(station_id: &str) -> String {
    format!("stations/exits-{station_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_the_documented_shapes() {
        assert_eq!(od("1000", "1150", "2026-07-28"), "timetable/od-1000-1150-2026-07-28");
        assert_eq!(train("123"), "timetable/train-123");
        assert_eq!(station("1000", "2026-07-28", None), "timetable/station-1000-2026-07-28");
        assert_eq!(
            station("1000", "2026-07-28", Some("up")),
            "timetable/station-1000-2026-07-28-up"
        );
        assert_eq!(fare_od("1000", "1150"), "fare/od-1000-1150");
        assert_eq!(STATIONS_ALL, "stations/all");
        assert_eq!(lines_stations("PX"), "lines/stations-PX");
        assert_eq!(stations_exits("1000"), "stations/exits-1000");
        assert_ne!(STATIONS_ALL, LINES_ALL);
    }
}
