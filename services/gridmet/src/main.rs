//! gridMET pipeline command-line tool.
//!
//! - `run`: download gridMET bands for the given years and reduce every
//!   day to zip codes, counties or points
//! - `registry`: write the YAML data model of the output tables
//! - `locate`: reverse-geocode a coordinate, for checking point inputs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gridmet_service::download::NKN_BASE_URL;
use gridmet_service::geolocate::NOMINATIM_URL;
use gridmet_service::{
    collect_tasks, DownloadConfig, Downloader, GridmetConfig, LazyGeolocator, RunArgs,
};

#[derive(Parser, Debug)]
#[command(name = "gridmet")]
#[command(about = "Aggregate gridMET daily climate grids over zip codes, counties or points")]
struct Cli {
    /// Log level: trace|debug|info|warn|error (RUST_LOG overrides)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and aggregate years x variables
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Base URL of the gridMET archive
        #[arg(long, env = "GRIDMET_BASE_URL", default_value = NKN_BASE_URL)]
        base_url: String,
    },
    /// Write the YAML data model of the output tables
    Registry {
        /// Destination file
        path: PathBuf,
    },
    /// Print the address at a coordinate
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Nominatim server
        #[arg(long, env = "NOMINATIM_URL", default_value = NOMINATIM_URL)]
        nominatim_url: String,

        /// User agent sent to the geocoder
        #[arg(long, default_value = "gridmet")]
        user_agent: String,
    },
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn run(args: RunArgs, base_url: String) -> Result<()> {
    let config = Arc::new(GridmetConfig::resolve(&args)?);
    info!(
        variables = ?config.variables,
        years = ?config.years,
        geography = %config.geography,
        strategy = ?config.strategy,
        destination = %config.destination.display(),
        "Starting gridMET pipeline"
    );

    let downloader = Downloader::new(DownloadConfig {
        base_url,
        ..Default::default()
    })?;
    let tasks = collect_tasks(config, &downloader)?;

    let start = Instant::now();
    let mut rows = 0;
    for task in &tasks {
        let report = task.execute(&downloader).await?;
        rows += report.rows;
    }

    info!(
        tasks = tasks.len(),
        rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "All tasks have been executed"
    );
    Ok(())
}

async fn locate(lat: f64, lon: f64, nominatim_url: String, user_agent: String) -> Result<()> {
    let geolocator = LazyGeolocator::nominatim(nominatim_url, user_agent);
    match geolocator.reverse(lat, lon).await? {
        Some(address) => println!("{}", address),
        None => println!("No address found at ({}, {})", lat, lon),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Command::Run { args, base_url } => run(args, base_url).await,
        Command::Registry { path } => gridmet_service::registry::write_registry(&path),
        Command::Locate {
            lat,
            lon,
            nominatim_url,
            user_agent,
        } => locate(lat, lon, nominatim_url, user_agent).await,
    }
}
