use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use butterfly_nav::client::ReportApiClient;
use butterfly_nav::device::DeviceId;
use butterfly_nav::directions::DirectionsClient;
use butterfly_nav::geo::{parse_coordinates, validate_coordinates};
use butterfly_nav::pipeline::TrafficReporter;
use butterfly_nav::report::{ReportSubmission, ReportType, RouteContext, Severity};
use butterfly_nav::server;
use butterfly_nav::store::{LocalReportCache, MemoryReportStore};

#[derive(Parser)]
struct CliParser {
    /// Base URL of the traffic-reports server.
    #[arg(long, default_value = "http://localhost:8788")]
    server: String,

    /// Directory holding the device id and the local report cache.
    #[arg(long, default_value = ".butterfly-nav")]
    data_dir: PathBuf,

    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the traffic-reports server. Reports live in memory and are lost
    /// when the process stops.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8788")]
        listen: SocketAddr,
    },
    /// Submit a traffic report, falling back to the local cache when the
    /// server is unreachable.
    Submit {
        /// Event type: traffic_jam, road_closed, accident, construction,
        /// hazard, or police.
        #[arg(long = "type")]
        kind: ReportType,
        /// Severity: low, medium, or high.
        #[arg(long, default_value = "medium")]
        severity: Severity,
        /// Position of the event, "lat,lon".
        #[arg(long)]
        location: String,
        /// Optional free-text description.
        #[arg(long)]
        description: Option<String>,
        /// Route start the report was made against, "lat,lon".
        #[arg(long)]
        start: Option<String>,
        /// Route end the report was made against, "lat,lon".
        #[arg(long)]
        end: Option<String>,
    },
    /// Fetch reports relevant to a route, merging server and cached results.
    Fetch {
        /// Route start, "lat,lon".
        start: String,
        /// Route end, "lat,lon".
        end: String,
    },
    /// Ask the server to purge expired reports.
    Cleanup,
    /// Calculate a car route via the routing provider.
    Route {
        /// Route start, "lat,lon".
        start: String,
        /// Route end, "lat,lon".
        end: String,
        /// Routing provider API key.
        #[arg(long, env = "TOMTOM_API_KEY")]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli_args = CliParser::parse();

    match cli_args.command {
        Command::Serve { listen } => {
            let store = Arc::new(MemoryReportStore::new());
            server::serve(listen, store).await?;
        }
        Command::Submit {
            kind,
            severity,
            location,
            description,
            start,
            end,
        } => {
            if !validate_coordinates(&location) {
                bail!("invalid report location {location:?}");
            }

            let route = match (start, end) {
                (Some(start), Some(end)) => Some(RouteContext { start, end }),
                (None, None) => None,
                _ => bail!("--start and --end must be given together"),
            };

            let reporter = build_reporter(&cli_args.server, &cli_args.data_dir)?;
            let report = reporter
                .submit_traffic_report(ReportSubmission {
                    route,
                    location: Some(parse_coordinates(&location)?),
                    kind,
                    severity,
                    description,
                    device_id: None,
                })
                .await;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Fetch { start, end } => {
            let reporter = build_reporter(&cli_args.server, &cli_args.data_dir)?;
            let reports = reporter.reports_for_route(&start, &end).await;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::Cleanup => {
            let client = ReportApiClient::new(cli_args.server);
            let cleaned = client.cleanup().await?;
            println!("cleaned: {cleaned}");
        }
        Command::Route {
            start,
            end,
            api_key,
        } => {
            let client = DirectionsClient::new(api_key);
            let route = client.route(&start, &end).await?;

            for (index, leg) in route.legs.iter().enumerate() {
                println!(
                    "leg {index}: {} points, {:.0} m",
                    leg.points.len(),
                    leg.summary.length_in_meters
                );
            }
        }
    }

    Ok(())
}

fn build_reporter(server: &str, data_dir: &std::path::Path) -> Result<TrafficReporter> {
    let device_id = DeviceId::load_or_create(&data_dir.join("device-id"))?;
    let cache = LocalReportCache::new(data_dir.join("traffic-reports.json"));
    let client = ReportApiClient::new(server);

    Ok(TrafficReporter::new(client, cache, device_id))
}
