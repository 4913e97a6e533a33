//! gridMET pipeline service.
//!
//! Downloads yearly gridMET grids and reduces each day to zip codes,
//! counties or point locations, writing one CSV per (band, year).

pub mod config;
pub mod download;
pub mod geolocate;
pub mod registry;
pub mod task;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use grid_processor::RasterDataset;

pub use config::{GridmetConfig, RunArgs};
pub use download::{DownloadConfig, Downloader};
pub use geolocate::{Geolocator, LazyGeolocator, NominatimGeolocator};
pub use task::{destination_file_name, ComputeTask, GridmetTask, TaskReport};

/// Open a source grid.
#[cfg(feature = "native")]
pub fn open_dataset(path: &Path) -> Result<Arc<dyn RasterDataset>> {
    netcdf_parser::silence_hdf5_errors();
    let dataset = netcdf_parser::NetCdfDataset::open(path)?;
    Ok(Arc::new(dataset))
}

/// Open a source grid.
#[cfg(not(feature = "native"))]
pub fn open_dataset(path: &Path) -> Result<Arc<dyn RasterDataset>> {
    anyhow::bail!(
        "cannot read {}: built without NetCDF support (rebuild with --features native)",
        path.display()
    )
}

/// Plan one task per (year, variable), in year-major order.
pub fn collect_tasks(config: Arc<GridmetConfig>, downloader: &Downloader) -> Result<Vec<GridmetTask>> {
    let mut tasks = Vec::with_capacity(config.years.len() * config.variables.len());
    for &year in &config.years {
        for &variable in &config.variables {
            let url = downloader.url_for(variable, year);
            tasks.push(GridmetTask::new(config.clone(), year, variable, &url)?);
        }
    }
    Ok(tasks)
}
