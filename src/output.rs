//! Renders command results either as a single JSON document (`--json`) or
//! as short human-readable lines on stdout, per the envelope described for
//! structured errors: `{success, error: {code, message, ...}}` / successes
//! render the bare payload.

use serde::Serialize;
use tra_core::error::TraError;
use tra_core::health::HealthReport;
use tra_core::models::{Alert, FareOption, JourneyOption, Station};
use tra_core::pool::{PoolCapacity, SlotMetricsReport};
use tra_core::station_resolver::ResolvedStation;

pub struct Output {
    json: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => eprintln!("failed to render JSON output: {err}"),
            }
        } else {
            println!("{}", text());
        }
    }

    pub fn error(&self, err: &TraError) {
        if self.json {
            let envelope = ErrorEnvelope {
                success: false,
                error: ErrorBody {
                    code: err.code(),
                    message: err.to_string(),
                },
            };
            if let Ok(rendered) = serde_json::to_string_pretty(&envelope) {
                eprintln!("{rendered}");
            }
        } else {
            eprintln!("error [{}]: {}", err.code(), err);
            if let TraError::StationNotFound { suggestion: Some(s), .. } = err {
                eprintln!("did you mean: {s}?");
            }
        }
    }

    pub fn station(&self, resolved: &ResolvedStation) {
        self.emit(&SerializableResolved::from(resolved), || {
            format!(
                "{} ({}) — confidence: {:?}",
                resolved.station.name, resolved.station.id, resolved.confidence
            )
        });
    }

    pub fn stations(&self, stations: &[Station]) {
        self.emit(&stations.to_vec(), || {
            stations
                .iter()
                .map(|s| format!("{}\t{}", s.id, s.name))
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    pub fn journeys(&self, options: &[JourneyOption]) {
        self.emit(&options.to_vec(), || {
            options
                .iter()
                .map(|o| {
                    format!(
                        "{:?} {} -> {} ({} min, {} transfer{})",
                        o.kind,
                        o.departure,
                        o.arrival,
                        o.total_duration_min,
                        o.transfers,
                        if o.transfers == 1 { "" } else { "s" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    pub fn alerts(&self, alerts: &[Alert]) {
        self.emit(&alerts.to_vec(), || {
            if alerts.is_empty() {
                "no active alerts".to_string()
            } else {
                alerts
                    .iter()
                    .map(|a| format!("[{}] {}", a.id, a.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        });
    }

    pub fn fares(&self, options: &[FareOption]) {
        self.emit(&options.to_vec(), || {
            options
                .iter()
                .map(|o| {
                    let marker = if o.recommended { "*" } else { " " };
                    format!("{marker} {:?} fare={} savings={}", o.kind, o.total_fare, o.savings)
                })
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    pub fn health(&self, report: &HealthReport) {
        self.emit(&SerializableHealth::from(report), || {
            format!(
                "overall: {:?} ({}/{} slots active, {}/{} tokens available)",
                report.overall,
                report.active_slot_count,
                report.components.len(),
                report.capacity.available,
                report.capacity.max
            )
        });
    }

    pub fn metrics(&self, slots: &[SlotMetricsReport], capacity: &PoolCapacity) {
        #[derive(Serialize)]
        struct MetricsPayload<'a> {
            capacity: &'a PoolCapacity,
            slots: &'a [SlotMetricsReport],
        }
        self.emit(
            &MetricsPayload { capacity, slots },
            || {
                slots
                    .iter()
                    .map(|s| {
                        format!(
                            "{}\t{:?}\t{} total / {} failed",
                            s.label.clone().unwrap_or_else(|| s.id.clone()),
                            s.state,
                            s.metrics.total_requests,
                            s.metrics.failed_requests
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        );
    }

    pub fn raw(&self, value: &[serde_json::Value]) {
        self.emit(&value.to_vec(), || serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

#[derive(Serialize)]
struct SerializableResolved {
    station: Station,
    confidence: String,
}

impl From<&ResolvedStation> for SerializableResolved {
    fn from(r: &ResolvedStation) -> Self {
        Self {
            station: r.station.clone(),
            confidence: format!("{:?}", r.confidence).to_lowercase(),
        }
    }
}

#[derive(Serialize)]
struct SerializableHealth {
    overall: String,
    capacity: PoolCapacity,
    active_slot_count: usize,
}

impl From<&HealthReport> for SerializableHealth {
    fn from(r: &HealthReport) -> Self {
        Self {
            overall: format!("{:?}", r.overall).to_lowercase(),
            capacity: r.capacity.clone(),
            active_slot_count: r.active_slot_count,
        }
    }
}
