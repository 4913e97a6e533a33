//! Per-day reduction of a layer to entity records.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};
use crate::layer::GridLayer;
use crate::sampler::{PointSampler, SampleWindow};
use crate::types::{
    AggregationRecord, MaskState, OutOfBoundsPolicy, PointEntity, PolygonEntity,
    RasterizationStrategy,
};
use crate::zonal::ZonalAggregator;

/// Turns one day's layer into one record per entity.
pub trait DailyReducer: Send {
    fn reduce_one_day(&mut self, layer: &GridLayer, date: NaiveDate)
        -> Result<Vec<AggregationRecord>>;

    /// Entities that produce a record each day.
    fn entity_count(&self) -> usize;
}

/// Zonal means over polygons.
pub struct PolygonReducer {
    aggregator: ZonalAggregator,
}

impl PolygonReducer {
    pub fn new(polygons: Vec<PolygonEntity>, strategy: RasterizationStrategy) -> Self {
        Self {
            aggregator: ZonalAggregator::new(polygons, strategy),
        }
    }
}

impl DailyReducer for PolygonReducer {
    fn reduce_one_day(
        &mut self,
        layer: &GridLayer,
        date: NaiveDate,
    ) -> Result<Vec<AggregationRecord>> {
        Ok(self
            .aggregator
            .aggregate(layer)?
            .into_iter()
            .map(|(label, value)| AggregationRecord::new(value, date, label))
            .collect())
    }

    fn entity_count(&self) -> usize {
        self.aggregator.polygon_count()
    }
}

/// A point located and classified once for the whole job.
#[derive(Debug, Clone)]
struct PreparedPoint {
    window: SampleWindow,
    mask: MaskState,
    label: Arc<[String]>,
}

/// Bilinear samples at points.
///
/// Points are located and classified against the snapshot layer once;
/// completely masked points are dropped up front.
pub struct PointReducer {
    sampler: PointSampler,
    snapshot: Arc<GridLayer>,
    points: Vec<PreparedPoint>,
}

impl PointReducer {
    pub fn prepare(
        points: Vec<PointEntity>,
        snapshot: Arc<GridLayer>,
        policy: OutOfBoundsPolicy,
    ) -> Result<Self> {
        let sampler = PointSampler::for_layer(&snapshot)?;
        let total = points.len();
        let mut prepared = Vec::with_capacity(total);
        let mut masked = 0usize;
        let mut skipped = 0usize;

        for point in points {
            let window = match sampler.locate(point.x, point.y) {
                Ok(window) => window,
                Err(e @ GridProcessorError::OutOfBounds { .. }) => match policy {
                    OutOfBoundsPolicy::Fail => return Err(e),
                    OutOfBoundsPolicy::Skip => {
                        warn!(x = point.x, y = point.y, "Skipping point outside raster");
                        skipped += 1;
                        continue;
                    }
                },
                Err(e) => return Err(e),
            };

            let mask = sampler.classify_mask(&window, &snapshot, &snapshot);
            if mask.is_completely_masked() {
                masked += 1;
                continue;
            }
            prepared.push(PreparedPoint {
                window,
                mask,
                label: point.metadata.into(),
            });
        }

        debug!(
            points = total,
            kept = prepared.len(),
            masked,
            skipped,
            "Prepared point partition"
        );
        Ok(Self {
            sampler,
            snapshot,
            points: prepared,
        })
    }
}

impl DailyReducer for PointReducer {
    fn reduce_one_day(
        &mut self,
        layer: &GridLayer,
        date: NaiveDate,
    ) -> Result<Vec<AggregationRecord>> {
        let records = self
            .points
            .iter()
            .map(|p| {
                let mut value = self.sampler.interpolate(&p.window, p.mask, layer);
                if value.is_none() && p.mask == MaskState::Unmasked {
                    // A corner went missing today: classify against both sources.
                    let today = self.sampler.classify_mask(&p.window, &self.snapshot, layer);
                    value = self.sampler.interpolate(&p.window, today, layer);
                }
                AggregationRecord::new(value, date, Arc::clone(&p.label))
            })
            .collect();
        Ok(records)
    }

    fn entity_count(&self) -> usize {
        self.points.len()
    }
}
