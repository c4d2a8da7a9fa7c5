//! QuakeView command-line tool
//!
//! Loads a data directory and prints one view as JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quakeview::time::{parse_instant, TimeRange};
use quakeview::views::{self, CertaintyFilter, ComparisonMode, ReportFilter};
use quakeview::{Category, DataStore, LocationId, StoreConfig};

/// Which view to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Neighborhood,
    Map,
    Comparison,
    Forecast,
    Insights,
    Reports,
}

impl View {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "neighborhood" => Some(Self::Neighborhood),
            "map" => Some(Self::Map),
            "comparison" => Some(Self::Comparison),
            "forecast" => Some(Self::Forecast),
            "insights" => Some(Self::Insights),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }
}

/// Command-line options
struct Args {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    view: View,
    category: Option<Category>,
    location: Option<LocationId>,
    time: Option<DateTime<Utc>>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    raw: bool,
    certainty: Option<CertaintyFilter>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            data_dir: None,
            view: View::Map,
            category: None,
            location: None,
            time: None,
            from: None,
            to: None,
            raw: false,
            certainty: None,
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn instant(flag: &str, raw: &str) -> DateTime<Utc> {
    parse_instant(raw).unwrap_or_else(|| fail(&format!("{flag}: invalid time: {raw}")))
}

fn print_help() {
    println!("quakeview - earthquake damage uncertainty views");
    println!();
    println!("USAGE:");
    println!("    quakeview [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>         JSON store configuration");
    println!("    -d, --data-dir <DIR>        Data directory [default: ./data]");
    println!("    -v, --view <VIEW>           neighborhood | map | comparison | forecast | insights | reports [default: map]");
    println!("        --category <CATEGORY>   Damage category [default: shake_intensity]");
    println!("    -l, --location <ID>         Neighborhood id");
    println!("    -t, --time <TIME>           Query time (RFC 3339 or YYYY-MM-DD HH:MM[:SS])");
    println!("        --from <TIME>           Range start for forecast and reports");
    println!("        --to <TIME>             Range end for forecast and reports");
    println!("        --raw                   Compare raw reports instead of model summaries");
    println!("        --certainty <BAND>      very_low | low | medium | high (reports view)");
    println!("    -h, --help                  Print help information");
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let next = args.get(i + 1).map(String::as_str);
        let value = || next.unwrap_or_else(|| fail(&format!("{flag} requires a value")));
        match flag {
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value())),
            "--data-dir" | "-d" => parsed.data_dir = Some(PathBuf::from(value())),
            "--view" | "-v" => {
                parsed.view = View::parse(value())
                    .unwrap_or_else(|| fail(&format!("unknown view: {}", value())));
            }
            "--category" => {
                parsed.category = Some(value().parse().unwrap_or_else(|e| fail(&format!("{e}"))));
            }
            "--location" | "-l" => parsed.location = Some(LocationId::new(value())),
            "--time" | "-t" => parsed.time = Some(instant(flag, value())),
            "--from" => parsed.from = Some(instant(flag, value())),
            "--to" => parsed.to = Some(instant(flag, value())),
            "--certainty" => {
                parsed.certainty = Some(value().parse().unwrap_or_else(|e: String| fail(&e)));
            }
            "--raw" => {
                parsed.raw = true;
                i += 1;
                continue;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => fail(&format!("unknown argument: {other}")),
        }
        i += 2;
    }
    parsed
}

fn load_config(args: &Args) -> StoreConfig {
    let config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path).unwrap_or_else(|e| fail(&e.to_string())),
        None => StoreConfig::default(),
    };
    let config = match &args.data_dir {
        Some(dir) => StoreConfig {
            data_dir: dir.clone(),
            ..config
        },
        None => config,
    };
    config.validate().unwrap_or_else(|e| fail(&e.to_string()))
}

fn require_location(args: &Args) -> &LocationId {
    args.location
        .as_ref()
        .unwrap_or_else(|| fail("this view requires --location"))
}

fn range(args: &Args) -> TimeRange {
    TimeRange {
        from: args.from,
        to: args.to,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let config = load_config(&args);
    info!(data_dir = %config.data_dir.display(), view = ?args.view, "starting");

    let store = DataStore::from_config(config);
    let category = args.category.unwrap_or(Category::ShakeIntensity);

    let output = match args.view {
        View::Neighborhood => {
            let time = args.time.unwrap_or_else(|| fail("neighborhood view requires --time"));
            serde_json::to_string_pretty(
                &views::neighborhood_snapshot(&store, require_location(&args), time).await?,
            )?
        }
        View::Map => serde_json::to_string_pretty(&views::map_view(&store, category, args.time).await?)?,
        View::Comparison => {
            let time = args.time.unwrap_or_else(|| fail("comparison view requires --time"));
            let mode = if args.raw {
                ComparisonMode::RawReports
            } else {
                ComparisonMode::Model
            };
            serde_json::to_string_pretty(
                &views::category_comparison(&store, mode, time, args.location.as_ref()).await?,
            )?
        }
        View::Forecast => {
            let window = range(&args);
            serde_json::to_string_pretty(
                &views::forecast_window(&store, require_location(&args), category, Some(&window)).await?,
            )?
        }
        View::Insights => serde_json::to_string_pretty(&views::insights(&store, category, args.time).await?)?,
        View::Reports => {
            let filter = ReportFilter {
                categories: args.category.into_iter().collect(),
                location: args.location.clone(),
                range: range(&args),
                certainty: args.certainty,
            };
            serde_json::to_string_pretty(&views::filtered_reports(&store, &filter).await?)?
        }
    };
    println!("{output}");

    info!(stats = ?store.stats(), "done");
    Ok(())
}
