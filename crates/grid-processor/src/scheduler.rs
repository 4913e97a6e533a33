//! Execution planning for point jobs.
//!
//! ```text
//! points ──► Partitions ──┬─► InMemory:    one reducer, one day loop
//!                         ├─► Partitioned: day loop per partition, in order
//!                         └─► Parallel:    rayon pool, ≤ max_in_flight partitions
//!                                          drained oldest-first to the sink
//! ```
//!
//! Parallel output is drained in submission order, so all three modes
//! write partitions in the order they were read.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;

use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, error, info, instrument};

use crate::config::{ForcedMode, SchedulerConfig};
use crate::driver::{PreparedJob, TemporalReductionDriver};
use crate::error::{GridProcessorError, Result};
use crate::reducers::{DailyReducer, PointReducer};
use crate::sink::{MemorySink, RecordSink};
use crate::types::{AggregationRecord, PointEntity};

/// How a point job is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    InMemory,
    Partitioned,
    Parallel { workers: usize },
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::InMemory => write!(f, "in-memory"),
            ExecutionMode::Partitioned => write!(f, "partitioned"),
            ExecutionMode::Parallel { workers } => write!(f, "parallel({})", workers),
        }
    }
}

/// Size facts about a point input used to pick a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputProfile {
    pub file_size: u64,
    pub point_count: usize,
    pub is_compressed: bool,
}

/// Outcome of a scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub partitions: usize,
    pub points_read: usize,
    pub points_used: usize,
    pub rows: u64,
}

/// Free physical memory in bytes.
pub fn available_memory() -> u64 {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    );
    system.available_memory()
}

/// Groups a point stream into bounded partitions.
pub struct Partitions<I> {
    inner: I,
    size: usize,
    done: bool,
}

impl<I> Partitions<I>
where
    I: Iterator<Item = Result<PointEntity>>,
{
    pub fn new(inner: I, size: usize) -> Self {
        Self {
            inner,
            size: size.max(1),
            done: false,
        }
    }
}

impl<I> Iterator for Partitions<I>
where
    I: Iterator<Item = Result<PointEntity>>,
{
    type Item = Result<Vec<PointEntity>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.size.min(4096));
        while batch.len() < self.size {
            match self.inner.next() {
                Some(Ok(point)) => batch.push(point),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}

/// Result of one partition computed off-thread.
struct PartitionOutput {
    points: usize,
    records: Vec<AggregationRecord>,
}

/// Chooses and drives an execution mode for point jobs.
pub struct AdaptivePointScheduler {
    config: SchedulerConfig,
}

impl AdaptivePointScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate().map_err(GridProcessorError::ConfigError)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Deterministic mode choice.
    ///
    /// Compressed inputs are inflated by the compression factor before the
    /// memory test. In-memory mode needs free memory above
    /// `memory_factor x size` and a point count below the ceiling; otherwise
    /// partitions run in parallel when more than one worker is configured.
    pub fn choose_mode(
        &self,
        free_memory: u64,
        file_size: u64,
        point_count: usize,
        is_compressed: bool,
    ) -> ExecutionMode {
        let estimated = if is_compressed {
            file_size.saturating_mul(self.config.compression_factor)
        } else {
            file_size
        };

        let fits = free_memory > estimated.saturating_mul(self.config.memory_factor);
        if fits && point_count < self.config.max_in_memory_points {
            ExecutionMode::InMemory
        } else if self.config.workers > 1 {
            ExecutionMode::Parallel {
                workers: self.config.workers,
            }
        } else {
            ExecutionMode::Partitioned
        }
    }

    /// Pick a mode for an input, honouring a forced mode.
    pub fn plan(&self, profile: &InputProfile) -> ExecutionMode {
        let mode = match self.config.forced_mode {
            Some(ForcedMode::Memory) => ExecutionMode::InMemory,
            Some(ForcedMode::Partitioned) => ExecutionMode::Partitioned,
            Some(ForcedMode::Parallel) => ExecutionMode::Parallel {
                workers: self.config.workers,
            },
            None => {
                let free = available_memory();
                debug!(
                    free_memory = free,
                    file_size = profile.file_size,
                    points = profile.point_count,
                    compressed = profile.is_compressed,
                    "Probing memory for point job"
                );
                self.choose_mode(
                    free,
                    profile.file_size,
                    profile.point_count,
                    profile.is_compressed,
                )
            }
        };
        info!(mode = %mode, forced = self.config.forced_mode.is_some(), "Planned point job");
        mode
    }

    /// Reduce `points` over every selected day using `mode`.
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn run<I>(
        &self,
        driver: &mut TemporalReductionDriver,
        points: I,
        mode: ExecutionMode,
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<PointEntity>>,
    {
        let start = Instant::now();
        let points = points.into_iter();
        let summary = driver.execute(|job| match mode {
            ExecutionMode::InMemory => self.run_in_memory(job, points, sink),
            ExecutionMode::Partitioned => self.run_partitioned(job, points, sink),
            ExecutionMode::Parallel { workers } => {
                self.run_parallel(job, points, workers, sink)
            }
        })?;

        info!(
            partitions = summary.partitions,
            points = summary.points_read,
            used = summary.points_used,
            rows = summary.rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Point job finished"
        );
        Ok(summary)
    }

    fn run_in_memory<I>(
        &self,
        job: &Arc<PreparedJob>,
        points: I,
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<PointEntity>>,
    {
        let points = points.collect::<Result<Vec<_>>>()?;
        let points_read = points.len();
        let mut reducer =
            PointReducer::prepare(points, job.snapshot()?, self.config.out_of_bounds)?;
        let rows = job.run_days(&mut reducer, sink)?;
        Ok(RunSummary {
            mode: ExecutionMode::InMemory,
            partitions: 1,
            points_read,
            points_used: reducer.entity_count(),
            rows,
        })
    }

    fn run_partitioned<I>(
        &self,
        job: &Arc<PreparedJob>,
        points: I,
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<PointEntity>>,
    {
        let snapshot = job.snapshot()?;
        let mut summary = RunSummary {
            mode: ExecutionMode::Partitioned,
            partitions: 0,
            points_read: 0,
            points_used: 0,
            rows: 0,
        };

        for (partition, batch) in Partitions::new(points, self.config.partition_size).enumerate() {
            let batch = batch?;
            summary.points_read += batch.len();
            let mut reducer =
                PointReducer::prepare(batch, Arc::clone(&snapshot), self.config.out_of_bounds)?;
            summary.points_used += reducer.entity_count();
            summary.rows += job.run_days(&mut reducer, sink)?;
            summary.partitions += 1;
            debug!(partition, "Partition complete");
        }
        Ok(summary)
    }

    fn run_parallel<I>(
        &self,
        job: &Arc<PreparedJob>,
        points: I,
        workers: usize,
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary>
    where
        I: Iterator<Item = Result<PointEntity>>,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gridmet-worker-{}", i))
            .panic_handler(|_| error!("Point worker panicked"))
            .build()
            .map_err(|e| GridProcessorError::ConfigError(format!("thread pool: {}", e)))?;

        let snapshot = job.snapshot()?;
        let policy = self.config.out_of_bounds;
        let max_in_flight = self.config.max_in_flight(workers);
        let mut in_flight: VecDeque<(usize, Receiver<Result<PartitionOutput>>)> =
            VecDeque::with_capacity(max_in_flight);

        let mut summary = RunSummary {
            mode: ExecutionMode::Parallel { workers },
            partitions: 0,
            points_read: 0,
            points_used: 0,
            rows: 0,
        };

        for (partition, batch) in Partitions::new(points, self.config.partition_size).enumerate() {
            let batch = batch?;
            summary.points_read += batch.len();

            // Backpressure: wait for the oldest partition before submitting more.
            while in_flight.len() >= max_in_flight {
                if let Some((id, rx)) = in_flight.pop_front() {
                    drain(id, rx, sink, &mut summary)?;
                }
            }

            let (tx, rx) = mpsc::sync_channel(1);
            let job = Arc::clone(job);
            let snapshot = Arc::clone(&snapshot);
            pool.spawn(move || {
                let result = PointReducer::prepare(batch, snapshot, policy).and_then(|mut reducer| {
                    let mut buffer = MemorySink::new();
                    job.run_days(&mut reducer, &mut buffer)?;
                    Ok(PartitionOutput {
                        points: reducer.entity_count(),
                        records: buffer.into_records(),
                    })
                });
                // Receiver is gone only when the producer already failed.
                let _ = tx.send(result);
            });
            debug!(partition, in_flight = in_flight.len() + 1, "Submitted partition");
            in_flight.push_back((partition, rx));
        }

        while let Some((id, rx)) = in_flight.pop_front() {
            drain(id, rx, sink, &mut summary)?;
        }
        Ok(summary)
    }
}

fn drain(
    partition: usize,
    rx: Receiver<Result<PartitionOutput>>,
    sink: &mut dyn RecordSink,
    summary: &mut RunSummary,
) -> Result<()> {
    let output = rx.recv().map_err(|_| {
        GridProcessorError::WorkerFailed(format!("partition {} produced no result", partition))
    })??;
    sink.write_records(&output.records)?;
    sink.flush()?;
    summary.points_used += output.points;
    summary.rows += output.records.len() as u64;
    summary.partitions += 1;
    debug!(partition, rows = output.records.len(), "Drained partition");
    Ok(())
}
