//! Service alert lookup with a one-hour in-memory cache (§4.12). Alerts are
//! fetched, filtered to `Status == 2` (active), normalized, and cached as a
//! list — `isStationSuspended`/`checkStations` serve off that cached list
//! rather than re-fetching per lookup.

use crate::error::TraError;
use crate::models::{Alert, AlertStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ALERT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
struct RawAlert {
    id: String,
    title: String,
    description: String,
    status: u8,
    #[serde(default)]
    affected_station_ids: Vec<String>,
    #[serde(default)]
    affected_line_ids: Vec<String>,
}

use serde::Deserialize;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

struct Cached {
    alerts: Vec<Alert>,
    fetched_at_ms: i64,
}

/// A small fixed set of CJK regex patterns used to pull an advisory
/// substitute-transport phrase out of an alert description. Best-effort:
/// the result is never authoritative.
fn parse_alternative_transport(description: &str) -> Option<String> {
    let patterns = [
        r"請改搭([^\s，。]+)",
        r"建議改搭([^\s，。]+)",
        r"可改搭([^\s，。]+)",
        r"替代交通[:：]\s*([^\s，。]+)",
    ];
    for pattern in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            if let Some(captures) = re.captures(description) {
                return captures.get(1).map(|m| m.as_str().to_string());
            }
        }
    }
    None
}

fn normalize(raw: RawAlert) -> Option<Alert> {
    if raw.status != 2 {
        return None;
    }
    let alternative_transport = parse_alternative_transport(&raw.description);
    Some(Alert {
        id: raw.id,
        title: raw.title,
        description: raw.description,
        status: AlertStatus::Active,
        affected_station_ids: raw.affected_station_ids,
        affected_line_ids: raw.affected_line_ids,
        alternative_transport,
    })
}

/// Fetches, normalizes, and caches the active-alert list. The fetch
/// function is injected so callers can point it at `ApiClient` (or a test
/// double) without this module depending on the HTTP pipeline directly.
pub struct AlertService<F> {
    fetch_raw: F,
    cache: Mutex<Option<Cached>>,
}

impl<F> AlertService<F>
where
    F: Fn() -> Result<Vec<serde_json::Value>, TraError>,
{
    pub fn new(fetch_raw: F) -> Self {
        Self {
            fetch_raw,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached active-alert list if younger than one hour,
    /// otherwise fetches, normalizes, and caches a fresh one.
    pub fn get_active_alerts(&self) -> Result<Vec<Alert>, TraError> {
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.as_ref() {
                if now_ms() - cached.fetched_at_ms < ALERT_CACHE_TTL.as_millis() as i64 {
                    return Ok(cached.alerts.clone());
                }
            }
        }

        let raw_values = (self.fetch_raw)()?;
        let alerts: Vec<Alert> = raw_values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawAlert>(v).ok())
            .filter_map(normalize)
            .collect();

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(Cached {
            alerts: alerts.clone(),
            fetched_at_ms: now_ms(),
        });
        Ok(alerts)
    }

    pub fn is_station_suspended(&self, station_id: &str) -> Result<bool, TraError> {
        let alerts = self.get_active_alerts()?;
        Ok(alerts
            .iter()
            .any(|a| a.affected_station_ids.iter().any(|id| id == station_id)))
    }

    pub fn check_stations(&self, station_ids: &[String]) -> Result<HashMap<String, Alert>, TraError> {
        let alerts = self.get_active_alerts()?;
        let mut hits = HashMap::new();
        for id in station_ids {
            if let Some(alert) = alerts
                .iter()
                .find(|a| a.affected_station_ids.iter().any(|s| s == id))
            {
                hits.insert(id.clone(), alert.clone());
            }
        }
        Ok(hits)
    }
}
