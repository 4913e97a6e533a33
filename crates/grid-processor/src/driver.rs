//! Day-by-day reduction of a raster variable to entity records.
//!
//! ```text
//! Initialized ──prepare──► Prepared ──run──► Running ──► Completed
//!      │                                        │
//!      └──────────────── error ─────────────────┴──────► Failed
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveDate;
use gridmet_common::{day_to_date, DateFilter};
use tracing::{debug, info, instrument, warn};

use crate::cache::LayerCache;
use crate::dataset::{resolve_variable, RasterDataset};
use crate::error::{GridProcessorError, Result};
use crate::layer::GridLayer;
use crate::reducers::DailyReducer;
use crate::sink::RecordSink;
use crate::types::{Affine, CacheStats};

/// Lifecycle of a reduction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Initialized,
    Prepared,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Initialized => "initialized",
            JobState::Prepared => "prepared",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// One selected time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayStep {
    /// Index into the dataset's time axis.
    pub time_index: usize,
    /// Day offset from the calendar epoch.
    pub day: i64,
    pub date: NaiveDate,
}

/// Resolved, read-only state of a prepared job. Shared by workers.
pub struct PreparedJob {
    dataset: Arc<dyn RasterDataset>,
    semantic_name: String,
    variable: String,
    transform: Affine,
    days: Vec<DayStep>,
    cache: Mutex<LayerCache>,
    snapshot: Mutex<Option<Arc<GridLayer>>>,
}

impl std::fmt::Debug for PreparedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedJob")
            .field("semantic_name", &self.semantic_name)
            .field("variable", &self.variable)
            .field("transform", &self.transform)
            .field("days", &self.days.len())
            .finish_non_exhaustive()
    }
}

impl PreparedJob {
    /// Name the caller asked for.
    pub fn semantic_name(&self) -> &str {
        &self.semantic_name
    }

    /// Internal dataset variable it resolved to.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn transform(&self) -> &Affine {
        &self.transform
    }

    /// Selected time steps in ascending time-axis order.
    pub fn days(&self) -> &[DayStep] {
        &self.days
    }

    /// Materialize the layer for a time index.
    pub fn layer(&self, time_index: usize) -> Result<Arc<GridLayer>> {
        if let Some(layer) = self.lock_cache()?.get(time_index) {
            return Ok(layer);
        }

        let layer = Arc::new(
            self.dataset
                .read_slice(&self.variable, time_index)?
                .into_layer(self.transform)?,
        );
        self.lock_cache()?.insert(time_index, Arc::clone(&layer));
        Ok(layer)
    }

    /// First layer of the dataset (time index 0), independent of the date
    /// filter. Point masks are derived from it.
    pub fn snapshot(&self) -> Result<Arc<GridLayer>> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| GridProcessorError::read_failed("snapshot lock poisoned"))?;
        if let Some(layer) = guard.as_ref() {
            return Ok(Arc::clone(layer));
        }
        let layer = Arc::new(
            self.dataset
                .read_slice(&self.variable, 0)?
                .into_layer(self.transform)?,
        );
        *guard = Some(Arc::clone(&layer));
        Ok(layer)
    }

    /// Run every selected day through `reducer`, flushing after each day.
    ///
    /// Returns the number of records written.
    pub fn run_days(
        &self,
        reducer: &mut dyn DailyReducer,
        sink: &mut dyn RecordSink,
    ) -> Result<u64> {
        let mut rows = 0u64;
        for step in &self.days {
            let start = Instant::now();
            let layer = self.layer(step.time_index)?;
            let records = reducer.reduce_one_day(&layer, step.date)?;
            sink.write_records(&records)?;
            sink.flush()?;
            rows += records.len() as u64;
            debug!(
                day = step.day,
                date = %step.date,
                records = records.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Reduced day"
            );
        }
        Ok(rows)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .map(|c| c.stats())
            .unwrap_or_default()
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, LayerCache>> {
        self.cache
            .lock()
            .map_err(|_| GridProcessorError::read_failed("layer cache lock poisoned"))
    }
}

/// Iterates a dataset's time axis and streams per-entity records.
pub struct TemporalReductionDriver {
    dataset: Arc<dyn RasterDataset>,
    semantic_name: String,
    date_filter: Option<DateFilter>,
    layer_cache_bytes: usize,
    state: JobState,
    job: Option<Arc<PreparedJob>>,
}

impl TemporalReductionDriver {
    pub fn new(dataset: Arc<dyn RasterDataset>, semantic_name: impl Into<String>) -> Self {
        Self {
            dataset,
            semantic_name: semantic_name.into(),
            date_filter: None,
            layer_cache_bytes: 0,
            state: JobState::Initialized,
            job: None,
        }
    }

    /// Only process days accepted by `filter`.
    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.date_filter = Some(filter);
        self
    }

    /// Keep up to `bytes` of decoded layers for reuse across partitions.
    pub fn with_layer_cache_bytes(mut self, bytes: usize) -> Self {
        self.layer_cache_bytes = bytes;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn job(&self) -> Option<Arc<PreparedJob>> {
        self.job.clone()
    }

    /// Resolve the variable, transform and selected time steps.
    #[instrument(skip(self), fields(variable = %self.semantic_name, dataset = %self.dataset.describe()))]
    pub fn prepare(&mut self) -> Result<Arc<PreparedJob>> {
        if self.state != JobState::Initialized {
            return Err(self.invalid_state(JobState::Initialized));
        }

        match self.build_job() {
            Ok(job) => {
                let job = Arc::new(job);
                info!(
                    internal_name = %job.variable,
                    days = job.days.len(),
                    "Prepared reduction job"
                );
                self.job = Some(Arc::clone(&job));
                self.state = JobState::Prepared;
                Ok(job)
            }
            Err(e) => {
                self.state = JobState::Failed;
                Err(e)
            }
        }
    }

    fn build_job(&self) -> Result<PreparedJob> {
        let variable = resolve_variable(self.dataset.as_ref(), &self.semantic_name)?;

        let transform = self.dataset.affine_transform()?;
        if !transform.is_invertible() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "dataset transform is not invertible: {:?}",
                transform
            )));
        }

        let mut days = Vec::new();
        for (time_index, day) in self.dataset.time_values()?.into_iter().enumerate() {
            let date = day_to_date(day).ok_or_else(|| {
                GridProcessorError::invalid_metadata(format!("day offset {} out of range", day))
            })?;
            if self.date_filter.as_ref().map_or(true, |f| f.accept(date)) {
                days.push(DayStep {
                    time_index,
                    day,
                    date,
                });
            }
        }
        if days.is_empty() {
            warn!("No time steps selected");
        }

        Ok(PreparedJob {
            dataset: Arc::clone(&self.dataset),
            semantic_name: self.semantic_name.clone(),
            variable,
            transform,
            days,
            cache: Mutex::new(LayerCache::new(self.layer_cache_bytes)),
            snapshot: Mutex::new(None),
        })
    }

    /// Run `body` against the prepared job, moving through Running to
    /// Completed or Failed. Prepares first when still Initialized.
    pub fn execute<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&Arc<PreparedJob>) -> Result<T>,
    {
        if self.state == JobState::Initialized {
            self.prepare()?;
        }
        let job = match (&self.job, self.state) {
            (Some(job), JobState::Prepared) => Arc::clone(job),
            _ => return Err(self.invalid_state(JobState::Prepared)),
        };

        self.state = JobState::Running;
        let start = Instant::now();
        match body(&job) {
            Ok(out) => {
                self.state = JobState::Completed;
                info!(
                    variable = %job.semantic_name,
                    days = job.days.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Reduction job completed"
                );
                Ok(out)
            }
            Err(e) => {
                self.state = JobState::Failed;
                warn!(variable = %job.semantic_name, error = %e, "Reduction job failed");
                Err(e)
            }
        }
    }

    /// Reduce every selected day with `reducer` into `sink`.
    ///
    /// The caller writes the header. Rows flushed before a failure stay valid.
    pub fn run(&mut self, reducer: &mut dyn DailyReducer, sink: &mut dyn RecordSink) -> Result<u64> {
        info!(entities = reducer.entity_count(), "Starting daily reduction");
        self.execute(|job| job.run_days(reducer, sink))
    }

    fn invalid_state(&self, expected: JobState) -> GridProcessorError {
        GridProcessorError::InvalidState {
            expected: expected.as_str(),
            found: self.state.as_str(),
        }
    }
}
