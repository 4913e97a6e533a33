//! Raster-to-entity reduction engine for daily climate grids.
//!
//! Each day of a gridded variable is reduced to one value per entity:
//! a zonal mean for polygons (zip codes, counties) or a bilinear sample
//! for points (sites, stations). Output is a tidy `(value, date, label)`
//! stream.
//!
//! # Architecture
//!
//! ```text
//! RasterDataset ──► TemporalReductionDriver::prepare
//!                        │  resolve variable by standard_name
//!                        │  select days (DateFilter)
//!                        ▼
//!                   PreparedJob ──► layer(time_index) ──► LayerCache
//!                        │
//!          ┌─────────────┴──────────────┐
//!          ▼                            ▼
//!   PolygonReducer               AdaptivePointScheduler
//!   (ZonalAggregator)              │ InMemory | Partitioned | Parallel
//!          │                       ▼
//!          │                  PointReducer (PointSampler)
//!          └──────────┬───────────┘
//!                     ▼
//!               RecordSink (CSV, gzip)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{
//!     CsvSink, PolygonReducer, RasterizationStrategy, RecordSink,
//!     TemporalReductionDriver, output_header,
//! };
//!
//! let mut driver = TemporalReductionDriver::new(dataset, "tmmx");
//! let mut reducer = PolygonReducer::new(polygons, RasterizationStrategy::Combined);
//! let mut sink = CsvSink::create("tmmx_zip_polygon_2020.csv.gz")?;
//! sink.write_header(&output_header("tmmx", &["zip"]))?;
//! driver.run(&mut reducer, &mut sink)?;
//! sink.finish()?;
//! ```

pub mod cache;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod layer;
pub mod reducers;
pub mod sampler;
pub mod scheduler;
pub mod sink;
pub mod testdata;
pub mod types;
pub mod zonal;

// Re-export commonly used types at crate root
pub use cache::LayerCache;
pub use config::{ForcedMode, SchedulerConfig};
pub use dataset::{resolve_variable, InMemoryDataset, RasterDataset, RasterSlice, VariableDescriptor};
pub use driver::{DayStep, JobState, PreparedJob, TemporalReductionDriver};
pub use error::{GridProcessorError, Result};
pub use layer::GridLayer;
pub use reducers::{DailyReducer, PointReducer, PolygonReducer};
pub use sampler::{PointSampler, SampleWindow};
pub use scheduler::{
    available_memory, AdaptivePointScheduler, ExecutionMode, InputProfile, Partitions, RunSummary,
};
pub use sink::{is_gzip_path, output_header, CsvSink, MemorySink, RecordSink};
pub use types::{
    format_value, Affine, AggregationRecord, CacheStats, MaskState, OutOfBoundsPolicy,
    PointEntity, PolygonEntity, RasterizationStrategy, ZoneGeometry,
};
pub use zonal::{reconcile, ZonalAggregator, ZonalMean};
