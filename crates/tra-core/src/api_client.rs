//! Binds TDX endpoints to the request pipeline: cache → slot → rate limit
//! → token → circuit breaker → retry → HTTP → decode → normalize → cache
//! (§4.7). One method per upstream endpoint used.

use crate::branch_line::BranchLineResolver;
use crate::cache_keys;
use crate::cache_store::CacheStore;
use crate::error::TraError;
use crate::http::{self, HttpRequest, ResilientHttp};
use crate::models::{BranchLineInfo, JourneySegment, Station, TrainEntry};
use crate::normalize::simplify_train_type;
use crate::pool::KeyPool;
use crate::timetable_matcher::StationTimetableMatcher;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tra_ratelimiter::RateLimiterError;

const BASE_URL: &str = "https://tdx.transportdata.tw";

const TTL_REFERENCE: Duration = Duration::from_secs(7 * 24 * 60 * 60); // stations, lines, station-of-line, OD fare
const TTL_TRANSFERS: Duration = Duration::from_secs(24 * 60 * 60); // line transfers, station exits
const TTL_TIMETABLE: Duration = Duration::from_secs(24 * 60 * 60); // OD / train / station timetable, keyed by date

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub skip_cache: bool,
}

#[derive(Debug, Deserialize)]
struct NameZh {
    #[serde(rename = "Zh_tw")]
    zh_tw: String,
}

#[derive(Debug, Deserialize)]
struct StationPosition {
    #[serde(rename = "PositionLat")]
    lat: f64,
    #[serde(rename = "PositionLon")]
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "StationID")]
    station_id: String,
    #[serde(rename = "StationName")]
    station_name: NameZh,
    #[serde(rename = "StationPosition")]
    position: Option<StationPosition>,
}

#[derive(Debug, Deserialize)]
struct TrainInfoRow {
    #[serde(rename = "TrainNo")]
    train_no: String,
    #[serde(rename = "TrainTypeCode")]
    train_type_code: String,
    #[serde(rename = "TrainTypeName")]
    train_type_name: NameZh,
    #[serde(rename = "BikeFlag")]
    bike_flag: Option<bool>,
    #[serde(rename = "WheelChairFlag")]
    wheel_chair_flag: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StopTimeRow {
    #[serde(rename = "StationID")]
    station_id: String,
    #[serde(rename = "ArrivalTime")]
    arrival_time: String,
    #[serde(rename = "DepartureTime")]
    departure_time: String,
}

#[derive(Debug, Deserialize)]
struct TimetableRow {
    #[serde(rename = "TrainInfo")]
    train_info: TrainInfoRow,
    #[serde(rename = "StopTimes")]
    stop_times: Vec<StopTimeRow>,
}

#[derive(Debug, Deserialize)]
struct LineRow {
    #[serde(rename = "LineID")]
    line_id: String,
}

#[derive(Debug, Deserialize)]
struct LineStationRow {
    #[serde(rename = "StationID")]
    station_id: String,
}

#[derive(Debug, Deserialize)]
struct StationOfLineRow {
    #[serde(rename = "Stations")]
    stations: Vec<LineStationRow>,
}

#[derive(Debug, Deserialize)]
struct LineTransferRow {
    #[serde(rename = "FromStationID")]
    from_station_id: String,
    #[serde(rename = "ToStationID")]
    to_station_id: String,
    #[serde(rename = "MinTransferTime")]
    min_transfer_time: u32,
}

fn rate_limit_err(err: RateLimiterError) -> TraError {
    match err {
        RateLimiterError::RateLimited { retries } => TraError::RateLimited { retries },
        RateLimiterError::Cancelled => TraError::Cancelled,
    }
}

fn lift_list(body: serde_json::Value, field: &str) -> Vec<serde_json::Value> {
    match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove(field) {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn row_to_entry(row: TimetableRow) -> TrainEntry {
    let origin = row.stop_times.first();
    let destination = row.stop_times.last();
    TrainEntry {
        train_no: row.train_info.train_no,
        train_type: simplify_train_type(&row.train_info.train_type_name.zh_tw),
        train_type_code: row.train_info.train_type_code,
        departure: origin.map(|s| s.departure_time.clone()).unwrap_or_default(),
        arrival: destination.map(|s| s.arrival_time.clone()).unwrap_or_default(),
        bike_flag: row.train_info.bike_flag,
        wheel_chair_flag: row.train_info.wheel_chair_flag,
    }
}

/// Binds TDX endpoints to the resilient HTTP pipeline. Cheap to clone:
/// every field is `Arc`-backed or itself internally synchronized.
#[derive(Clone)]
pub struct ApiClient {
    pool: Arc<KeyPool>,
    cache: Arc<CacheStore>,
    pipeline: ResilientHttp,
    branch_lines: Option<Arc<BranchLineResolver>>,
}

impl ApiClient {
    pub fn new(pool: Arc<KeyPool>, cache: Arc<CacheStore>, pipeline: ResilientHttp) -> Self {
        Self {
            pool,
            cache,
            pipeline,
            branch_lines: None,
        }
    }

    /// Supplies the branch-line table `query_od` needs to pick between the
    /// OD endpoint (main-line only) and the station-timetable matcher
    /// (§4.11). Loaded once at startup via [`Self::load_branch_line_resolver`].
    pub fn with_branch_lines(mut self, resolver: Arc<BranchLineResolver>) -> Self {
        self.branch_lines = Some(resolver);
        self
    }

    /// The shared key pool, for the CLI's `tra keys` / `tra health` commands.
    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Current state of the single global circuit breaker (§9 Open
    /// Question 1), for [`crate::health::HealthCheckService`].
    pub fn circuit_state(&self) -> tra_circuitbreaker::CircuitState {
        self.pipeline.state()
    }

    /// Runs the common pipeline: cache check, slot selection, rate limit,
    /// token, HTTP call through the resilient pipeline, decode, slot
    /// health update, cache write. `cache_key` of `None` means "never
    /// cached" (the live endpoints, §4.7 item 6).
    async fn execute_cached<T, F>(
        &self,
        cache_key: Option<(String, Duration)>,
        skip_cache: bool,
        url: String,
        decode: F,
    ) -> Result<T, TraError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
        F: FnOnce(serde_json::Value) -> T,
    {
        if let Some((key, _)) = &cache_key {
            if !skip_cache {
                if let Some(cached) = self.cache.get::<T>(key).await {
                    return Ok(cached);
                }
            }
        }

        let slot = self.pool.get_slot()?;
        slot.rate_limiter.acquire().await.map_err(rate_limit_err)?;
        let token = slot.auth.get_token().await?;

        match http::call(&self.pipeline, HttpRequest { url, token }).await {
            Ok(body) => {
                let value = decode(body);
                slot.record_success();
                if let Some((key, ttl)) = &cache_key {
                    let _ = self.cache.put(key, &value, *ttl).await;
                }
                Ok(value)
            }
            Err(err) => {
                slot.record_failure(&err);
                Err(err)
            }
        }
    }

    /// `GET /v3/Rail/TRA/Station` — 7-day TTL.
    pub async fn stations(&self, options: QueryOptions) -> Result<Vec<Station>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/Station");
        self.execute_cached(
            Some((cache_keys::STATIONS_ALL.to_string(), TTL_REFERENCE)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "Stations")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<StationRow>(v).ok())
                    .map(|row| Station {
                        id: row.station_id,
                        name: row.station_name.zh_tw,
                        lat: row.position.as_ref().map(|p| p.lat).unwrap_or(0.0),
                        lon: row.position.as_ref().map(|p| p.lon).unwrap_or(0.0),
                    })
                    .collect()
            },
        )
        .await
    }

    async fn station_name_lookup(&self, options: QueryOptions) -> HashMap<String, String> {
        self.stations(options)
            .await
            .map(|stations| stations.into_iter().map(|s| (s.id, s.name)).collect())
            .unwrap_or_default()
    }

    /// `GET /v3/Rail/TRA/DailyTrainTimetable/OD/{from}/to/{to}/{date}`.
    /// Main-line only: branch-line pairs go through
    /// [`StationTimetableMatcher`] instead, which [`Self::query_od`]
    /// dispatches to transparently.
    async fn daily_od_timetable(
        &self,
        from: &str,
        to: &str,
        date: &str,
        options: QueryOptions,
    ) -> Result<Vec<JourneySegment>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/DailyTrainTimetable/OD/{from}/to/{to}/{date}");
        let names = self.station_name_lookup(options).await;
        let from_id = from.to_string();
        let to_id = to.to_string();
        let from_name = names.get(from).cloned().unwrap_or_else(|| from.to_string());
        let to_name = names.get(to).cloned().unwrap_or_else(|| to.to_string());

        self.execute_cached(
            Some((cache_keys::od(from, to, date), TTL_TIMETABLE)),
            options.skip_cache,
            url,
            move |body| {
                lift_list(body, "TrainTimetables")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<TimetableRow>(v).ok())
                    .filter_map(|row| {
                        let origin = row.stop_times.iter().find(|s| s.station_id == from_id)?;
                        let destination = row.stop_times.iter().find(|s| s.station_id == to_id)?;
                        Some(JourneySegment {
                            train_no: row.train_info.train_no.clone(),
                            train_type: simplify_train_type(&row.train_info.train_type_name.zh_tw),
                            train_type_code: row.train_info.train_type_code.clone(),
                            from_station_id: from_id.clone(),
                            from_station_name: from_name.clone(),
                            to_station_id: to_id.clone(),
                            to_station_name: to_name.clone(),
                            departure: origin.departure_time.clone(),
                            arrival: destination.arrival_time.clone(),
                            bike_flag: row.train_info.bike_flag,
                            wheel_chair_flag: row.train_info.wheel_chair_flag,
                        })
                    })
                    .collect()
            },
        )
        .await
    }

    /// `GET /v3/Rail/TRA/GeneralTrainTimetable/TrainNo/{no}` — 1-day TTL.
    pub async fn general_train_timetable(&self, train_no: &str, options: QueryOptions) -> Result<Vec<TrainEntry>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/GeneralTrainTimetable/TrainNo/{train_no}");
        self.execute_cached(
            Some((cache_keys::train(train_no), TTL_TIMETABLE)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "TrainTimetables")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<TimetableRow>(v).ok())
                    .map(row_to_entry)
                    .collect()
            },
        )
        .await
    }

    /// `GET /v3/Rail/TRA/DailyStationTimetable/Today/Station/{id}` — 1-day
    /// TTL, keyed by `date`.
    pub async fn daily_station_timetable(
        &self,
        station_id: &str,
        date: &str,
        options: QueryOptions,
    ) -> Result<Vec<TrainEntry>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/DailyStationTimetable/Today/Station/{station_id}");
        self.execute_cached(
            Some((cache_keys::station(station_id, date, None), TTL_TIMETABLE)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "StationTimetables")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<TimetableRow>(v).ok())
                    .map(row_to_entry)
                    .collect()
            },
        )
        .await
    }

    /// Chooses between the OD endpoint (main-line) and the station
    /// timetable matcher (branch-line involved), transparently to callers
    /// (§4.11).
    pub async fn query_od(
        &self,
        from: &str,
        to: &str,
        date: &str,
        options: QueryOptions,
    ) -> Result<Vec<JourneySegment>, TraError> {
        let is_branch = self
            .branch_lines
            .as_ref()
            .map(|r| r.is_branch_line_station(from) || r.is_branch_line_station(to))
            .unwrap_or(false);

        if !is_branch {
            return self.daily_od_timetable(from, to, date, options).await;
        }

        let names = self.station_name_lookup(options).await;
        let origin_timetable = self.daily_station_timetable(from, date, options).await?;
        let destination_timetable = self.daily_station_timetable(to, date, options).await?;
        let from_name = names.get(from).cloned().unwrap_or_else(|| from.to_string());
        let to_name = names.get(to).cloned().unwrap_or_else(|| to.to_string());
        Ok(StationTimetableMatcher::match_segments(
            from,
            &from_name,
            to,
            &to_name,
            &origin_timetable,
            &destination_timetable,
        ))
    }

    /// `GET /v3/Rail/TRA/TrainLiveBoard/TrainNo/{no}` — never cached (§4.7
    /// item 6).
    pub async fn train_live_board(&self, train_no: &str) -> Result<Vec<serde_json::Value>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/TrainLiveBoard/TrainNo/{train_no}");
        self.execute_cached(None, true, url, |body| lift_list(body, "TrainLiveBoards"))
            .await
    }

    /// `GET /v2/Rail/TRA/LiveTrainDelay` with an OData `$filter` over the
    /// given train numbers — never cached.
    pub async fn live_train_delay(&self, train_nos: &[String]) -> Result<Vec<serde_json::Value>, TraError> {
        let filter = train_nos
            .iter()
            .map(|n| format!("TrainNo eq '{n}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        let url = format!("{BASE_URL}/v2/Rail/TRA/LiveTrainDelay?$filter={}", urlencode(&filter));
        self.execute_cached(None, true, url, |body| lift_list(body, "")).await
    }

    /// `GET /v3/Rail/TRA/StationLiveBoard/{id}` — never cached.
    pub async fn station_live_board(&self, station_id: &str) -> Result<Vec<serde_json::Value>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/StationLiveBoard/{station_id}");
        self.execute_cached(None, true, url, |body| lift_list(body, "StationLiveBoards"))
            .await
    }

    /// `GET /v3/Rail/TRA/ODFare/{from}/to/{to}` — 7-day TTL.
    pub async fn od_fare(&self, from: &str, to: &str, options: QueryOptions) -> Result<Vec<serde_json::Value>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/ODFare/{from}/to/{to}");
        self.execute_cached(
            Some((cache_keys::fare_od(from, to), TTL_REFERENCE)),
            options.skip_cache,
            url,
            |body| lift_list(body, "ODFares"),
        )
        .await
    }

    /// `GET /v3/Rail/TRA/Line` — 7-day TTL.
    pub async fn lines(&self, options: QueryOptions) -> Result<Vec<String>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/Line");
        self.execute_cached(
            Some((cache_keys::LINES_ALL.to_string(), TTL_REFERENCE)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "Lines")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<LineRow>(v).ok())
                    .map(|row| row.line_id)
                    .collect()
            },
        )
        .await
    }

    /// `GET /v3/Rail/TRA/StationOfLine/{lineId}` — 7-day TTL.
    pub async fn station_of_line(&self, line_id: &str, options: QueryOptions) -> Result<Vec<String>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/StationOfLine/{line_id}");
        self.execute_cached(
            Some((cache_keys::lines_stations(line_id), TTL_REFERENCE)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "StationOfLines")
                    .into_iter()
                    .find_map(|v| serde_json::from_value::<StationOfLineRow>(v).ok())
                    .map(|line| line.stations.into_iter().map(|s| s.station_id).collect())
                    .unwrap_or_default()
            },
        )
        .await
    }

    /// Fetches `station_of_line` for every branch line and assembles a
    /// [`BranchLineResolver`] (§4.9).
    pub async fn load_branch_line_resolver(&self) -> Result<BranchLineResolver, TraError> {
        let mut by_line = HashMap::new();
        for line_id in crate::branch_line::BRANCH_LINES {
            let stations = self.station_of_line(line_id, QueryOptions::default()).await?;
            if !stations.is_empty() {
                by_line.insert(line_id.to_string(), stations);
            }
        }
        Ok(BranchLineResolver::new(by_line))
    }

    pub fn branch_line_info(&self, station_id: &str) -> Option<BranchLineInfo> {
        self.branch_lines.as_ref()?.get_branch_line_info(station_id)
    }

    /// `GET /v3/Rail/TRA/LineTransfer` — 1-day TTL.
    pub async fn line_transfers(&self, options: QueryOptions) -> Result<Vec<(String, String, u32)>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/LineTransfer");
        self.execute_cached(
            Some((cache_keys::LINES_TRANSFERS.to_string(), TTL_TRANSFERS)),
            options.skip_cache,
            url,
            |body| {
                lift_list(body, "LineTransfers")
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<LineTransferRow>(v).ok())
                    .map(|row| (row.from_station_id, row.to_station_id, row.min_transfer_time))
                    .collect()
            },
        )
        .await
    }

    /// `GET /v3/Rail/TRA/Alert` — raw passthrough; [`crate::alerts::AlertService`]
    /// owns normalization and its own 1-hour cache, so this is never
    /// cached at the `ApiClient` level.
    pub async fn station_alerts(&self) -> Result<Vec<serde_json::Value>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/Alert");
        self.execute_cached(None, true, url, |body| lift_list(body, "Alerts")).await
    }

    /// `GET /v3/Rail/TRA/StationExit/{id}` — 1-day TTL.
    pub async fn station_exits(&self, station_id: &str, options: QueryOptions) -> Result<Vec<serde_json::Value>, TraError> {
        let url = format!("{BASE_URL}/v3/Rail/TRA/StationExit/{station_id}");
        self.execute_cached(
            Some((cache_keys::stations_exits(station_id), TTL_TRANSFERS)),
            options.skip_cache,
            url,
            |body| lift_list(body, "StationExits"),
        )
        .await
    }
}

fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
