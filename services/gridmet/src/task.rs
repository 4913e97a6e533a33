//! Per (year, variable) pipeline tasks.
//!
//! A [`GridmetTask`] owns one source grid and one output file. It first
//! makes sure the grid is on disk, then runs its compute tasks in order:
//! reductions over shapefiles (polygons or ZIP point sites) and/or one
//! point reduction over a CSV of locations. The first compute task creates the output file, later
//! ones append to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use entity_sources::{
    find_shape_file, load_polygons, profile_point_file, PointColumns, PointStream,
};
use gridmet_common::{GridmetVariable, Shape};
use grid_processor::{
    output_header, AdaptivePointScheduler, CsvSink, PolygonReducer, RasterDataset, RecordSink,
    TemporalReductionDriver,
};
use tracing::{info, instrument};

use crate::config::GridmetConfig;
use crate::download::{url_file_name, Downloader};

/// One reduction feeding a task's output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeTask {
    /// Zonal means over the polygons (or point sites) of a shapefile.
    Shapes { shape_file: PathBuf },
    /// Bilinear samples at the rows of a point file.
    Points { points: PathBuf },
}

/// Outcome of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub output: PathBuf,
    pub rows: u64,
    pub compute_tasks: usize,
}

/// Download-and-reduce work for one band in one year.
#[derive(Debug, Clone)]
pub struct GridmetTask {
    pub year: i32,
    pub variable: GridmetVariable,
    /// Local source grid.
    pub raw_download: PathBuf,
    /// Where to fetch the source grid from, unless it was given as a file.
    pub download_url: Option<String>,
    pub output: PathBuf,
    pub compute: Vec<ComputeTask>,
    config: Arc<GridmetConfig>,
}

/// Output path: `{variable}_{geography}_{shape|all}_{year}.csv[.gz]`.
pub fn destination_file_name(config: &GridmetConfig, year: i32, variable: GridmetVariable) -> PathBuf {
    let mut name = format!(
        "{}_{}_{}_{}.csv",
        variable.as_str(),
        config.geography.as_str(),
        config.shape_tag(),
        year
    );
    if config.compress {
        name.push_str(".gz");
    }
    config.destination.join(name)
}

/// Directory downloads go to, given `raw_downloads`. A path with an
/// extension names a file, and its parent is used.
fn download_dir(raw_downloads: &Path) -> PathBuf {
    if raw_downloads.extension().is_some() && !raw_downloads.is_dir() {
        raw_downloads
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    } else {
        raw_downloads.to_path_buf()
    }
}

impl GridmetTask {
    /// Plan the task. Shapefiles are discovered here so that a missing one
    /// fails before anything is downloaded.
    ///
    /// Explicit shapefiles win. Otherwise, when polygons are requested or no
    /// point file is given, one shapefile is discovered per requested shape.
    /// A point file adds a point reduction when points are requested.
    pub fn new(
        config: Arc<GridmetConfig>,
        year: i32,
        variable: GridmetVariable,
        downloader_url: &str,
    ) -> Result<Self> {
        let (raw_download, download_url) = if config.raw_downloads.is_file() {
            (config.raw_downloads.clone(), None)
        } else {
            let target = download_dir(&config.raw_downloads).join(url_file_name(downloader_url));
            (target, Some(downloader_url.to_string()))
        };

        let mut compute = Vec::new();
        if !config.shape_files.is_empty() {
            compute.extend(config.shape_files.iter().map(|f| ComputeTask::Shapes {
                shape_file: f.clone(),
            }));
        } else if config.shapes.contains(&Shape::Polygon) || config.points.is_none() {
            for &shape in &config.shapes {
                let shape_file =
                    find_shape_file(&config.shapes_dir, year, config.geography, shape)?;
                compute.push(ComputeTask::Shapes { shape_file });
            }
        }

        if config.shapes.contains(&Shape::Point) {
            if let Some(points) = &config.points {
                compute.push(ComputeTask::Points {
                    points: points.clone(),
                });
            }
        }

        if compute.is_empty() {
            bail!(
                "Invalid combination of arguments: shapes [{}] with points {:?} yield nothing to compute",
                config
                    .shapes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                config.points
            );
        }

        Ok(Self {
            year,
            variable,
            raw_download,
            download_url,
            output: destination_file_name(&config, year, variable),
            compute,
            config,
        })
    }

    /// Fetch the source grid if needed, then run the compute tasks on a
    /// blocking thread.
    #[instrument(skip(self, downloader), fields(year = self.year, variable = %self.variable))]
    pub async fn execute(&self, downloader: &Downloader) -> Result<TaskReport> {
        if let Some(url) = &self.download_url {
            downloader.ensure(url, &self.raw_download).await?;
        }

        let task = self.clone();
        tokio::task::spawn_blocking(move || {
            let dataset = crate::open_dataset(&task.raw_download)?;
            task.compute(dataset)
        })
        .await
        .context("Compute task panicked")?
    }

    /// Run every compute task against an open dataset.
    pub fn compute(&self, dataset: Arc<dyn RasterDataset>) -> Result<TaskReport> {
        std::fs::create_dir_all(&self.config.destination).with_context(|| {
            format!("Failed to create {}", self.config.destination.display())
        })?;

        let start = Instant::now();
        let mut rows = 0;
        for (i, task) in self.compute.iter().enumerate() {
            let mut sink = if i == 0 {
                CsvSink::create(&self.output)?
            } else {
                CsvSink::append(&self.output)?
            };
            rows += match task {
                ComputeTask::Shapes { shape_file } => {
                    self.reduce_shapes(dataset.clone(), shape_file, &mut sink)?
                }
                ComputeTask::Points { points } => {
                    self.reduce_points(dataset.clone(), points, &mut sink)?
                }
            };
            sink.finish()?;
        }

        info!(
            output = %self.output.display(),
            rows,
            tasks = self.compute.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Task complete"
        );
        Ok(TaskReport {
            output: self.output.clone(),
            rows,
            compute_tasks: self.compute.len(),
        })
    }

    fn driver(&self, dataset: Arc<dyn RasterDataset>) -> TemporalReductionDriver {
        let driver = TemporalReductionDriver::new(dataset, self.variable.standard_name());
        match &self.config.dates {
            Some(filter) => driver.with_date_filter(filter.clone()),
            None => driver,
        }
    }

    fn reduce_shapes(
        &self,
        dataset: Arc<dyn RasterDataset>,
        shape_file: &Path,
        sink: &mut CsvSink,
    ) -> Result<u64> {
        let geography = self.config.geography;
        let polygons = load_polygons(shape_file, geography.label_fields())?;
        info!(
            shape_file = %shape_file.display(),
            entities = polygons.len(),
            strategy = ?self.config.strategy,
            "Reducing over shapefile"
        );

        sink.write_header(&output_header(self.variable.as_str(), &[geography.as_str()]))?;
        let mut reducer = PolygonReducer::new(polygons, self.config.strategy);
        Ok(self.driver(dataset).run(&mut reducer, sink)?)
    }

    fn reduce_points(
        &self,
        dataset: Arc<dyn RasterDataset>,
        points: &Path,
        sink: &mut CsvSink,
    ) -> Result<u64> {
        let columns = PointColumns::new(&self.config.coordinates, &self.config.metadata)?;
        let profile = profile_point_file(points)?;
        let scheduler = AdaptivePointScheduler::new(self.config.scheduler.clone())?;
        let mode = scheduler.plan(&profile);
        info!(points = %points.display(), count = profile.point_count, %mode, "Reducing over points");

        sink.write_header(&output_header(self.variable.as_str(), &columns.label_columns()))?;
        let stream = PointStream::open(points, columns)?;
        let mut driver = self
            .driver(dataset)
            .with_layer_cache_bytes(self.config.scheduler.layer_cache_bytes());
        let summary = scheduler.run(
            &mut driver,
            stream.map(|r| r.map_err(Into::into)),
            mode,
            sink,
        )?;
        Ok(summary.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunArgs;

    fn config(args: RunArgs) -> GridmetConfig {
        GridmetConfig::resolve(&args).unwrap()
    }

    fn base_args() -> RunArgs {
        RunArgs {
            variables: vec!["tmmx".into()],
            years: vec!["2020".into()],
            destination: Some(PathBuf::from("out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_destination_file_name() {
        let mut args = base_args();
        let plain = config(args.clone());
        assert_eq!(
            destination_file_name(&plain, 2020, GridmetVariable::Tmmx),
            PathBuf::from("out/tmmx_zip_polygon_2020.csv")
        );

        args.compress = true;
        args.geography = Some("county".into());
        args.shapes = vec!["point".into(), "polygon".into()];
        let gz = config(args);
        assert_eq!(
            destination_file_name(&gz, 2001, GridmetVariable::Pr),
            PathBuf::from("out/pr_county_all_2001.csv.gz")
        );
    }

    #[test]
    fn test_explicit_shape_files_and_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("tmmx_2020.nc");
        std::fs::write(&raw, b"x").unwrap();

        let mut args = base_args();
        args.raw_downloads = Some(raw.clone());
        args.shape_files = vec![PathBuf::from("a.shp"), PathBuf::from("b.shp")];
        let task =
            GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, "http://h/tmmx_2020.nc")
                .unwrap();

        assert_eq!(task.raw_download, raw);
        assert_eq!(task.download_url, None);
        assert_eq!(
            task.compute,
            vec![
                ComputeTask::Shapes { shape_file: PathBuf::from("a.shp") },
                ComputeTask::Shapes { shape_file: PathBuf::from("b.shp") },
            ]
        );
    }

    #[test]
    fn test_download_target_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args();
        args.raw_downloads = Some(dir.path().to_path_buf());
        args.shape_files = vec![PathBuf::from("a.shp")];
        let url = "https://www.northwestknowledge.net/metdata/data/tmmx_2020.nc";
        let task =
            GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, url).unwrap();

        assert_eq!(task.raw_download, dir.path().join("tmmx_2020.nc"));
        assert_eq!(task.download_url.as_deref(), Some(url));
    }

    #[test]
    fn test_download_dir() {
        assert_eq!(download_dir(Path::new("data/downloads")), PathBuf::from("data/downloads"));
        assert_eq!(download_dir(Path::new("data/grid.nc")), PathBuf::from("data"));
    }

    #[test]
    fn test_missing_shapefile_fails_planning() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args();
        args.shapes_dir = Some(dir.path().to_path_buf());
        let err = GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, "u/x.nc")
            .unwrap_err();
        assert!(err.to_string().contains("no shapefile"));
    }

    fn touch_shapefile(root: &Path, year: i32, shape: &str) -> PathBuf {
        let folder = root.join(year.to_string()).join("zip").join(shape);
        std::fs::create_dir_all(&folder).unwrap();
        let path = folder.join(entity_sources::esri_file_name(year));
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_point_shape_without_points_uses_point_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let shape_file = touch_shapefile(dir.path(), 2020, "point");

        let mut args = base_args();
        args.shapes_dir = Some(dir.path().to_path_buf());
        args.shapes = vec!["point".into()];
        let task = GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, "u/x.nc")
            .unwrap();
        assert_eq!(task.compute, vec![ComputeTask::Shapes { shape_file }]);
    }

    #[test]
    fn test_all_shapes_with_points_adds_point_reduction() {
        let dir = tempfile::tempdir().unwrap();
        let polygon_file = touch_shapefile(dir.path(), 2020, "polygon");
        let point_file = touch_shapefile(dir.path(), 2020, "point");

        let mut args = base_args();
        args.shapes_dir = Some(dir.path().to_path_buf());
        args.shapes = vec!["polygon".into(), "point".into()];
        args.points = Some(PathBuf::from("sites.csv"));
        args.coordinates = vec!["lon".into(), "lat".into()];
        args.metadata = vec!["site".into()];
        let task = GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, "u/x.nc")
            .unwrap();
        assert_eq!(
            task.compute,
            vec![
                ComputeTask::Shapes { shape_file: polygon_file },
                ComputeTask::Shapes { shape_file: point_file },
                ComputeTask::Points { points: PathBuf::from("sites.csv") },
            ]
        );
    }

    #[test]
    fn test_point_shape_with_points_skips_shapefiles() {
        let mut args = base_args();
        args.shapes = vec!["point".into()];
        args.points = Some(PathBuf::from("sites.csv"));
        args.coordinates = vec!["lon".into(), "lat".into()];
        args.metadata = vec!["site".into()];
        let task = GridmetTask::new(Arc::new(config(args)), 2020, GridmetVariable::Tmmx, "u/x.nc")
            .unwrap();
        assert_eq!(
            task.compute,
            vec![ComputeTask::Points { points: PathBuf::from("sites.csv") }]
        );
    }
}
