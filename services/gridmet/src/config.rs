//! Pipeline configuration.
//!
//! Settings come from three layers: a YAML file (`--config`), command-line
//! flags (which win over the file), and `GRIDMET_*` environment variables
//! for the point scheduler knobs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use gridmet_common::{parse_years, DateFilter, Geography, GridmetVariable, Shape};
use grid_processor::{OutOfBoundsPolicy, RasterizationStrategy, SchedulerConfig};
use serde::Deserialize;

/// Arguments of the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// YAML file with the same keys as these flags
    #[arg(long, short = 'c', env = "GRIDMET_CONFIG")]
    pub config: Option<PathBuf>,

    /// gridMET bands to process, e.g. tmmx pr
    #[arg(long, visible_alias = "var", num_args = 1.., value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Years, as single years or inclusive ranges: 1992:1995 1998
    #[arg(long, short = 'y', num_args = 1..)]
    pub years: Vec<String>,

    /// Rasterization strategy: default|all_touched|combined|downscale[:N]
    #[arg(long, short = 's')]
    pub strategy: Option<String>,

    /// Refinement factor for the downscale strategy
    #[arg(long)]
    pub downscale_factor: Option<usize>,

    /// Directory for the processed files
    #[arg(long, visible_alias = "dest", short = 'd', env = "GRIDMET_DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Directory (or single file) for raw downloaded grids
    #[arg(long, env = "GRIDMET_RAW_DOWNLOADS")]
    pub raw_downloads: Option<PathBuf>,

    /// Geography to aggregate over: zip|county
    #[arg(long, visible_alias = "geo")]
    pub geography: Option<String>,

    /// Directory of shapefiles laid out as {year}/{geography}/{point|polygon}/
    #[arg(long, env = "GRIDMET_SHAPES_DIR")]
    pub shapes_dir: Option<PathBuf>,

    /// Shape kinds to aggregate over: point, polygon
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub shapes: Vec<String>,

    /// CSV file (optionally .gz) with point locations
    #[arg(long)]
    pub points: Option<PathBuf>,

    /// Coordinate columns of the points file, longitude first
    #[arg(long, visible_alias = "xy", num_args = 1.., value_delimiter = ',')]
    pub coordinates: Vec<String>,

    /// Metadata columns of the points file; the first is the label
    #[arg(long, visible_alias = "meta", short = 'm', num_args = 1.., value_delimiter = ',')]
    pub metadata: Vec<String>,

    /// Date filter, e.g. month:1,2 or 2020-01-01:2020-03-31
    #[arg(long)]
    pub dates: Option<String>,

    /// Explicit shapefiles, bypassing discovery under shapes_dir
    #[arg(long, num_args = 1..)]
    pub shape_files: Vec<PathBuf>,

    /// Gzip the output files
    #[arg(long)]
    pub compress: bool,

    /// Points outside the grid: fail|skip
    #[arg(long)]
    pub out_of_bounds: Option<String>,
}

/// A year in YAML may be written as a number or as a range string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum YearItem {
    Year(i32),
    Spec(String),
}

impl YearItem {
    fn to_spec(&self) -> String {
        match self {
            YearItem::Year(y) => y.to_string(),
            YearItem::Spec(s) => s.clone(),
        }
    }
}

/// Shape of the YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    variables: Option<Vec<String>>,
    years: Option<Vec<YearItem>>,
    strategy: Option<String>,
    downscale_factor: Option<usize>,
    destination: Option<PathBuf>,
    raw_downloads: Option<PathBuf>,
    geography: Option<String>,
    shapes_dir: Option<PathBuf>,
    shapes: Option<Vec<String>>,
    points: Option<PathBuf>,
    coordinates: Option<Vec<String>>,
    metadata: Option<Vec<String>>,
    dates: Option<String>,
    shape_files: Option<Vec<PathBuf>>,
    compress: Option<bool>,
    out_of_bounds: Option<String>,
    scheduler: Option<SchedulerConfig>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Fully resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct GridmetConfig {
    pub variables: Vec<GridmetVariable>,
    pub years: Vec<i32>,
    pub strategy: RasterizationStrategy,
    pub destination: PathBuf,
    pub raw_downloads: PathBuf,
    pub geography: Geography,
    pub shapes_dir: PathBuf,
    pub shapes: Vec<Shape>,
    pub points: Option<PathBuf>,
    pub coordinates: Vec<String>,
    pub metadata: Vec<String>,
    pub dates: Option<DateFilter>,
    pub shape_files: Vec<PathBuf>,
    pub compress: bool,
    pub scheduler: SchedulerConfig,
}

fn non_empty<T>(cli: Vec<T>, file: Option<Vec<T>>) -> Vec<T> {
    if cli.is_empty() {
        file.unwrap_or_default()
    } else {
        cli
    }
}

impl GridmetConfig {
    /// Merge the YAML file (if any), CLI flags and environment.
    pub fn resolve(args: &RunArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args.clone(), file)
    }

    fn merge(args: RunArgs, file: FileConfig) -> Result<Self> {
        let variables = non_empty(args.variables, file.variables)
            .iter()
            .map(|v| v.parse::<GridmetVariable>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let year_specs = if args.years.is_empty() {
            file.years
                .unwrap_or_default()
                .iter()
                .map(YearItem::to_spec)
                .collect()
        } else {
            args.years
        };
        let years = parse_years(&year_specs)?;

        let mut strategy = match args.strategy.or(file.strategy) {
            Some(s) => s.parse::<RasterizationStrategy>()?,
            None => RasterizationStrategy::default(),
        };
        if let (RasterizationStrategy::Downscale { .. }, Some(factor)) =
            (strategy, args.downscale_factor.or(file.downscale_factor))
        {
            if factor == 0 {
                bail!("downscale_factor must be > 0");
            }
            strategy = RasterizationStrategy::Downscale { factor };
        }

        let geography = match args.geography.or(file.geography) {
            Some(g) => g.parse::<Geography>()?,
            None => Geography::Zip,
        };

        let mut shapes = non_empty(args.shapes, file.shapes)
            .iter()
            .map(|s| s.parse::<Shape>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if shapes.is_empty() {
            shapes.push(Shape::Polygon);
        }

        let dates = args
            .dates
            .or(file.dates)
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.parse::<DateFilter>())
            .transpose()?;

        let mut scheduler = match file.scheduler {
            Some(s) => s,
            None => SchedulerConfig::from_env(),
        };
        if let Some(policy) = args.out_of_bounds.or(file.out_of_bounds) {
            scheduler.out_of_bounds = policy.parse::<OutOfBoundsPolicy>()?;
        }

        let config = Self {
            variables,
            years,
            strategy,
            destination: args
                .destination
                .or(file.destination)
                .unwrap_or_else(|| PathBuf::from("data/processed")),
            raw_downloads: args
                .raw_downloads
                .or(file.raw_downloads)
                .unwrap_or_else(|| PathBuf::from("data/downloads")),
            geography,
            shapes_dir: args
                .shapes_dir
                .or(file.shapes_dir)
                .unwrap_or_else(|| PathBuf::from("shapes")),
            shapes,
            points: args.points.or(file.points),
            coordinates: non_empty(args.coordinates, file.coordinates),
            metadata: non_empty(args.metadata, file.metadata),
            dates,
            shape_files: non_empty(args.shape_files, file.shape_files),
            compress: args.compress || file.compress.unwrap_or(false),
            scheduler,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce output.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            bail!("at least one variable is required (--variables)");
        }
        if self.years.is_empty() {
            bail!("at least one year is required (--years)");
        }
        if self.points.is_some() && self.shapes.contains(&Shape::Point) {
            if self.coordinates.len() != 2 {
                bail!(
                    "points need exactly two coordinate columns (--coordinates), got {}",
                    self.coordinates.len()
                );
            }
            if self.metadata.is_empty() {
                bail!("points need at least one metadata column for the label (--metadata)");
            }
        }
        self.scheduler
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid scheduler configuration: {}", e))?;
        Ok(())
    }

    /// Shape component of output file names: the single shape, or `all`.
    pub fn shape_tag(&self) -> &'static str {
        match self.shapes.as_slice() {
            [only] => only.as_str(),
            _ => "all",
        }
    }
}
