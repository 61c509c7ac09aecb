//! `tra`: a command-line client over the resilient TDX access layer in
//! `tra-core`. Thin by design — every command parses arguments, calls into
//! `tra-core`, and renders the result; no domain logic lives here.

mod output;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use tra_core::alerts::AlertService;
use tra_core::config::{load_credentials, load_file_config};
use tra_core::error::TraError;
use tra_core::fare::TpassFareCalculator;
use tra_core::health::HealthCheckService;
use tra_core::journey::{JourneyPlanner, PlannerOptions, SortKey, TransferLeg};
use tra_core::station_resolver::StationResolver;
use tra_core::tpass_regions::TpassRegionTable;
use tra_core::{build_api_client, AccessLayerConfig, ApiClient, QueryOptions};

use output::Output;

#[derive(Parser)]
#[command(name = "tra", version, about = "Resilient CLI access to Taiwan Railway (TDX) data")]
struct Cli {
    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a station name or id.
    Station {
        query: String,
    },
    /// List every station, or the closest matches to a query.
    Stations {
        query: Option<String>,
    },
    /// Find journey options between two stations on a given date.
    Journey {
        from: String,
        to: String,
        /// `yyyy-mm-dd`; defaults to today if omitted.
        date: Option<String>,
        #[arg(long, value_enum, default_value = "duration")]
        sort: SortKeyArg,
    },
    /// Live board for a train number.
    Train {
        train_no: String,
    },
    /// Live board for a station.
    Board {
        station_id: String,
    },
    /// Active service alerts, optionally filtered to a station.
    Alerts {
        station_id: Option<String>,
    },
    /// TPASS cross-region fare options for a trip.
    Fare {
        from: String,
        to: String,
    },
    /// Access-layer health report (key pool + circuit breaker).
    Health,
    /// Per-slot rate limiter / failure metrics.
    Metrics,
    /// Emit a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SortKeyArg {
    Transfers,
    Duration,
    Departure,
    Arrival,
}

impl From<SortKeyArg> for SortKey {
    fn from(value: SortKeyArg) -> Self {
        match value {
            SortKeyArg::Transfers => SortKey::Transfers,
            SortKeyArg::Duration => SortKey::Duration,
            SortKeyArg::Departure => SortKey::Departure,
            SortKeyArg::Arrival => SortKey::Arrival,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = Output::new(cli.json);

    if let Command::Completions { shell } = cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let credentials = load_credentials();
    if credentials.is_empty() {
        out.error(&TraError::bad_input("no TDX credentials configured (see TDX_CLIENT_ID/TDX_CLIENT_SECRET)"));
        return ExitCode::from(3);
    }

    let rate_limiter = load_file_config().rate_limiter_params();
    let client = build_api_client(
        credentials,
        AccessLayerConfig {
            rate_limiter,
            ..AccessLayerConfig::default()
        },
    );

    match run(&client, cli.command, &out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            out.error(&err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &TraError) -> u8 {
    match err {
        TraError::BadInput { .. } | TraError::StationNotFound { .. } => 1,
        TraError::NoAvailableSlots | TraError::AuthError { .. } if is_credential_error(err) => 3,
        _ => 2,
    }
}

fn is_credential_error(_err: &TraError) -> bool {
    // AuthError also covers a live 401/403 from a data endpoint with an
    // otherwise-valid credential; only `NoAvailableSlots` is an unambiguous
    // "nothing usable was configured" signal today. Kept as a named hook so
    // a future distinguishing AuthError variant doesn't have to touch the
    // exit-code table at every call site.
    false
}

async fn run(client: &ApiClient, command: Command, out: &Output) -> Result<(), TraError> {
    match command {
        Command::Station { query } => {
            let resolver = load_station_resolver(client).await?;
            let resolved = resolver.resolve(&query)?;
            out.station(&resolved);
        }
        Command::Stations { query } => {
            let resolver = load_station_resolver(client).await?;
            match query {
                Some(q) => out.stations(&resolver.search(&q, 10)),
                None => out.stations(resolver.get_all_stations()),
            }
        }
        Command::Journey { from, to, date, sort } => {
            let resolver = load_station_resolver(client).await?;
            let origin = resolver.resolve(&from)?.station;
            let destination = resolver.resolve(&to)?.station;
            let date = date.unwrap_or_else(today);

            let direct = client
                .query_od(&origin.id, &destination.id, &date, QueryOptions::default())
                .await?;

            let transfer_legs: Vec<TransferLeg> = match client.branch_line_info(&origin.id) {
                Some(info) => {
                    let first_leg = client
                        .query_od(&origin.id, &info.junction_station_id, &date, QueryOptions::default())
                        .await
                        .unwrap_or_default();
                    let second_leg = client
                        .query_od(&info.junction_station_id, &destination.id, &date, QueryOptions::default())
                        .await
                        .unwrap_or_default();
                    vec![TransferLeg {
                        transfer_station_id: info.junction_station_id,
                        first_leg,
                        second_leg,
                    }]
                }
                None => Vec::new(),
            };

            let mut options =
                JourneyPlanner::find_journey_options(&direct, &transfer_legs, PlannerOptions::default(), None);
            JourneyPlanner::sort_journeys(&mut options, sort.into());
            out.journeys(&options);
        }
        Command::Train { train_no } => {
            let board = client.train_live_board(&train_no).await?;
            out.raw(&board);
        }
        Command::Board { station_id } => {
            let board = client.station_live_board(&station_id).await?;
            out.raw(&board);
        }
        Command::Alerts { station_id } => {
            // Fetched once up front so the AlertService's normalization and
            // one-hour cache can stay synchronous (it's shared with the
            // `tra-core` library surface, which has no async dependency).
            let raw = client.station_alerts().await?;
            let service = AlertService::new(move || Ok(raw.clone()));
            match station_id {
                Some(id) => {
                    let hits = service.check_stations(std::slice::from_ref(&id))?;
                    out.alerts(&hits.into_values().collect::<Vec<_>>());
                }
                None => out.alerts(&service.get_active_alerts()?),
            }
        }
        Command::Fare { from, to } => {
            let resolver = load_station_resolver(client).await?;
            let origin = resolver.resolve(&from)?.station;
            let destination = resolver.resolve(&to)?.station;

            let regions = TpassRegionTable::builtin();
            let origin_in_home_region = regions.region_of(&origin.id).is_some();
            let destination_in_home_region = regions.same_region(&origin.id, &destination.id);
            let boundary_stations = if origin_in_home_region && !destination_in_home_region {
                regions.boundary_stations_for(&origin.id)
            } else {
                Vec::new()
            };

            let mut fares: HashMap<(String, String), u32> = HashMap::new();
            let direct_fare = fetch_fare(client, &origin.id, &destination.id).await?;
            fares.insert((origin.id.clone(), destination.id.clone()), direct_fare);
            for boundary in &boundary_stations {
                // A single failing boundary fare lookup is a secondary
                // query and is skipped, not fatal (§7); the calculator
                // itself also tolerates a missing entry per boundary.
                if let Ok(fare) = fetch_fare(client, boundary, &destination.id).await {
                    fares.insert((boundary.clone(), destination.id.clone()), fare);
                }
            }

            let options = TpassFareCalculator::calculate_cross_region_options(
                &origin.id,
                &destination.id,
                origin_in_home_region,
                destination_in_home_region,
                &boundary_stations,
                None,
                |from, to| {
                    fares
                        .get(&(from.to_string(), to.to_string()))
                        .copied()
                        .ok_or_else(|| TraError::NotFound {
                            message: format!("no fare for {from}-{to}"),
                        })
                },
            )?;
            out.fares(&options);
        }
        Command::Health => {
            let report = HealthCheckService::perform_health_check(client.pool(), client.circuit_state());
            out.health(&report);
        }
        Command::Metrics => {
            out.metrics(&client.pool().get_metrics(), &client.pool().get_capacity());
        }
        Command::Completions { .. } => unreachable!("handled before credential loading"),
    }
    Ok(())
}

async fn fetch_fare(client: &ApiClient, from: &str, to: &str) -> Result<u32, TraError> {
    let fares = client.od_fare(from, to, QueryOptions::default()).await?;
    fares
        .first()
        .and_then(|v| v.get("Price").and_then(|p| p.as_u64()))
        .map(|p| p as u32)
        .ok_or_else(|| TraError::NotFound {
            message: format!("no fare for {from}-{to}"),
        })
}

async fn load_station_resolver(client: &ApiClient) -> Result<StationResolver, TraError> {
    let stations = client.stations(QueryOptions::default()).await?;
    Ok(StationResolver::new(stations, Default::default(), Default::default()))
}

fn today() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days = now / 86_400;
    // Civil-from-days (Howard Hinnant's algorithm), good for any date after
    // the epoch; avoids pulling in a heavier date dependency for a single
    // "today, UTC" computation.
    let z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}
