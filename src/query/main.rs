//! Command-line queries against a cafe/region/quarter dataset.
//!
//! Loads the files named in the config (or on the command line), runs one
//! query and prints GeoJSON (or plain JSON for `locate` and `stats`) to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cafemap::{Config, EngineError, FileSource, Projection, QueryEngine};

mod render;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Spatial queries over cafes, regions and quarters")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// POI CSV, overrides [data].pois
    #[arg(long)]
    pois: Option<PathBuf>,

    /// Region GeoJSON, overrides [data].regions
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Quarter GeoJSON, overrides [data].quarters
    #[arg(long)]
    quarters: Option<PathBuf>,

    /// Which POI fields to print
    #[arg(long, value_enum, default_value_t = Fields::Full)]
    fields: Fields,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// POIs within a radius of a point
    Radius {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Radius in metres
        #[arg(short, long)]
        radius: Option<f64>,
    },
    /// The k POIs nearest to a point
    Nearest {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(short)]
        k: Option<usize>,
    },
    /// POIs inside a named region
    Region { name: String },
    /// POIs inside the quarter with a rank
    Quarter { rank: u32 },
    /// Export region boundaries
    Regions {
        /// Simplification tolerance in degrees
        #[arg(short, long)]
        tolerance: Option<f64>,
    },
    /// Export quarter boundaries
    Quarters {
        #[arg(short, long)]
        tolerance: Option<f64>,
    },
    /// Every POI
    Pois,
    /// Regions and quarter containing a point
    Locate {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
    },
    /// Dataset summary
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Fields {
    Full,
    Summary,
}

impl From<Fields> for Projection {
    fn from(fields: Fields) -> Self {
        match fields {
            Fields::Full => Projection::Full,
            Fields::Summary => Projection::Summary,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(path) = &args.pois {
        config.data.pois = Some(path.clone());
    }
    if let Some(path) = &args.regions {
        config.data.regions = Some(path.clone());
    }
    if let Some(path) = &args.quarters {
        config.data.quarters = Some(path.clone());
    }

    let engine = QueryEngine::new(&config);
    engine
        .reload(&FileSource::from_config(&config.data))
        .context("Failed to load data")?;
    info!("Data loaded, running {:?}", args.command);

    match run(&engine, &args.command, args.fields.into()) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(EngineError::NotFound(message)) => {
            println!("{}", serde_json::json!({ "error": message }));
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Query failed"),
    }
}

/// Run one command, returning the text to print
fn run(engine: &QueryEngine, command: &Command, projection: Projection) -> Result<String, EngineError> {
    let output = match command {
        Command::Radius { lon, lat, radius } => {
            pois_json(&engine.radius_search(*lon, *lat, *radius)?, projection)
        }
        Command::Nearest { lon, lat, k } => pois_json(&engine.k_nearest(*lon, *lat, *k)?, projection),
        Command::Region { name } => pois_json(&engine.within_region_by_name(name)?, projection),
        Command::Quarter { rank } => pois_json(&engine.within_quarter_by_rank(*rank)?, projection),
        Command::Pois => pois_json(&engine.all_pois()?, projection),
        Command::Regions { tolerance } => {
            to_json(&render::region_collection(&engine.list_regions(*tolerance)?))
        }
        Command::Quarters { tolerance } => {
            to_json(&render::quarter_collection(&engine.list_quarters(*tolerance)?))
        }
        Command::Locate { lon, lat } => to_json(&engine.locate(*lon, *lat)?),
        Command::Stats => to_json(&engine.stats()?),
    };
    Ok(output)
}

fn pois_json(hits: &[cafemap::PoiHit], projection: Projection) -> String {
    match render::poi_collection(hits, projection) {
        Ok(collection) => to_json(&collection),
        Err(e) => serde_json::json!({ "error": format!("{:#}", e) }).to_string(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}
