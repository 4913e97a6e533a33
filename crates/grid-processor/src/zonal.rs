//! Polygon zonal means over a grid layer.
//!
//! Cell membership depends only on the grid geometry (transform and shape),
//! which is constant across a dataset, so zones are rasterized once and
//! reused for every day.

use std::sync::Arc;

use geo::{
    BoundingRect, Contains, Intersects, LineString, MultiPoint, MultiPolygon, Point, Polygon, Relate,
};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::error::{GridProcessorError, Result};
use crate::layer::GridLayer;
use crate::types::{Affine, PolygonEntity, RasterizationStrategy, ZoneGeometry};

/// Mean for one polygon on one layer.
pub type ZonalMean = (Arc<[String]>, Option<f64>);

/// Grid geometry a set of zones was rasterized against.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GridGeometry {
    transform: Affine,
    width: usize,
    height: usize,
}

impl GridGeometry {
    fn of(layer: &GridLayer) -> Self {
        Self {
            transform: *layer.transform(),
            width: layer.width(),
            height: layer.height(),
        }
    }
}

/// Inclusive (row, col) ranges of cells overlapping the geometry's bounds.
fn candidate_cells(
    transform: &Affine,
    width: usize,
    height: usize,
    geometry: &MultiPolygon<f64>,
) -> Option<(std::ops::RangeInclusive<usize>, std::ops::RangeInclusive<usize>)> {
    let rect = geometry.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    let mut cols = (f64::INFINITY, f64::NEG_INFINITY);
    let mut rows = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in [(min.x, min.y), (max.x, min.y), (min.x, max.y), (max.x, max.y)] {
        let (c, r) = transform.inverse(x, y).ok()?;
        cols = (cols.0.min(c), cols.1.max(c));
        rows = (rows.0.min(r), rows.1.max(r));
    }

    let clamp = |lo: f64, hi: f64, n: usize| {
        let lo = lo.floor().max(0.0);
        let hi = hi.floor().min(n as f64 - 1.0);
        (lo <= hi).then(|| lo as usize..=hi as usize)
    };
    Some((clamp(rows.0, rows.1, height)?, clamp(cols.0, cols.1, width)?))
}

/// Cells belonging to one polygon.
#[derive(Debug, Clone)]
struct Zone {
    label: Arc<[String]>,
    /// (cell index, weight) pairs selected by cell center.
    center: Vec<(usize, u32)>,
    /// Cell indices selected by touch.
    touched: Vec<usize>,
}

/// Computes one mean per polygon per layer.
pub struct ZonalAggregator {
    polygons: Vec<PolygonEntity>,
    strategy: RasterizationStrategy,
    zones: Vec<Zone>,
    geometry: Option<GridGeometry>,
}

impl ZonalAggregator {
    pub fn new(polygons: Vec<PolygonEntity>, strategy: RasterizationStrategy) -> Self {
        Self {
            polygons,
            strategy,
            zones: Vec::new(),
            geometry: None,
        }
    }

    pub fn strategy(&self) -> RasterizationStrategy {
        self.strategy
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Mean of the layer over each polygon, in polygon order.
    pub fn aggregate(&mut self, layer: &GridLayer) -> Result<Vec<ZonalMean>> {
        let geometry = GridGeometry::of(layer);
        if self.geometry != Some(geometry) {
            self.rasterize(geometry)?;
        }

        let strategy = self.strategy;
        self.zones
            .par_iter()
            .map(|zone| -> Result<ZonalMean> {
                let value = match strategy {
                    RasterizationStrategy::CellCenter | RasterizationStrategy::Downscale { .. } => {
                        weighted_mean(layer, &zone.center)
                    }
                    RasterizationStrategy::AllTouched => mean(layer, &zone.touched),
                    RasterizationStrategy::Combined => reconcile(
                        &zone.label.join(","),
                        weighted_mean(layer, &zone.center),
                        mean(layer, &zone.touched),
                    )?,
                };
                Ok((zone.label.clone(), value))
            })
            .collect()
    }

    #[instrument(skip(self, geometry), fields(polygons = self.polygons.len(), strategy = ?self.strategy))]
    fn rasterize(&mut self, geometry: GridGeometry) -> Result<()> {
        let start = std::time::Instant::now();
        let strategy = self.strategy;
        self.zones = self
            .polygons
            .par_iter()
            .map(|polygon| rasterize_polygon(&geometry, polygon, strategy))
            .collect::<Result<Vec<_>>>()?;
        self.geometry = Some(geometry);

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            cells = self.zones.iter().map(|z| z.touched.len().max(z.center.len())).sum::<usize>(),
            "Rasterized zones"
        );
        Ok(())
    }
}

/// Combine the cell-center and all-touched means of one polygon.
///
/// The touched set is a superset of the center set, so a center mean
/// without a touched mean means the rasterization is broken.
pub fn reconcile(label: &str, center: Option<f64>, touched: Option<f64>) -> Result<Option<f64>> {
    match (center, touched) {
        (Some(c), Some(t)) => Ok(Some((c + t) / 2.0)),
        (None, Some(t)) => Ok(Some(t)),
        (Some(c), None) => Err(GridProcessorError::RasterizationInconsistency {
            label: label.to_string(),
            center: c,
        }),
        (None, None) => Ok(None),
    }
}

fn rasterize_polygon(
    geometry: &GridGeometry,
    polygon: &PolygonEntity,
    strategy: RasterizationStrategy,
) -> Result<Zone> {
    let mut zone = Zone {
        label: vec![polygon.label.clone()].into(),
        center: Vec::new(),
        touched: Vec::new(),
    };
    let shape = match &polygon.geometry {
        ZoneGeometry::Area(shape) => shape,
        ZoneGeometry::Sites(sites) => {
            let cells = site_cells(geometry, sites);
            zone.center = cells.iter().map(|&idx| (idx, 1)).collect();
            zone.touched = cells;
            return Ok(zone);
        }
    };

    let wants_center = !matches!(strategy, RasterizationStrategy::AllTouched);
    let wants_touched = matches!(
        strategy,
        RasterizationStrategy::AllTouched | RasterizationStrategy::Combined
    );

    if let RasterizationStrategy::Downscale { factor } = strategy {
        if factor == 0 {
            return Err(GridProcessorError::ConfigError(
                "downscale factor must be positive".to_string(),
            ));
        }
        zone.center = fine_center_cells(geometry, shape, factor);
        return Ok(zone);
    }

    let t = &geometry.transform;
    let Some((rows, cols)) = candidate_cells(t, geometry.width, geometry.height, shape)
    else {
        return Ok(zone);
    };

    for row in rows {
        for col in cols.clone() {
            let idx = row * geometry.width + col;
            let (c, r) = (col as f64, row as f64);
            if wants_center {
                let (x, y) = t.apply(c + 0.5, r + 0.5);
                if shape.contains(&Point::new(x, y)) {
                    zone.center.push((idx, 1));
                }
            }
            if wants_touched && touches_interior(shape, &cell_polygon(t, c, r)) {
                zone.touched.push(idx);
            }
        }
    }
    Ok(zone)
}

/// Distinct cells containing the sites. Sites off the grid are ignored.
fn site_cells(geometry: &GridGeometry, sites: &MultiPoint<f64>) -> Vec<usize> {
    let mut cells: Vec<usize> = sites
        .iter()
        .filter_map(|p| {
            let (c, r) = geometry.transform.inverse(p.x(), p.y()).ok()?;
            let (c, r) = (c.floor(), r.floor());
            let inside = c >= 0.0
                && r >= 0.0
                && c < geometry.width as f64
                && r < geometry.height as f64;
            inside.then(|| r as usize * geometry.width + c as usize)
        })
        .collect();
    cells.sort_unstable();
    cells.dedup();
    cells
}

/// Cell-center membership on a grid refined by `factor`, folded back onto
/// native cells as counts. Equivalent to disaggregating the layer and
/// taking a cell-center mean on the fine grid.
fn fine_center_cells(
    geometry: &GridGeometry,
    shape: &MultiPolygon<f64>,
    factor: usize,
) -> Vec<(usize, u32)> {
    let fine = geometry.transform.refined(factor);
    let (fw, fh) = (geometry.width * factor, geometry.height * factor);
    let Some((rows, cols)) = candidate_cells(&fine, fw, fh, shape) else {
        return Vec::new();
    };

    let mut counts: std::collections::BTreeMap<usize, u32> = Default::default();
    for row in rows {
        for col in cols.clone() {
            let (x, y) = fine.apply(col as f64 + 0.5, row as f64 + 0.5);
            if shape.contains(&Point::new(x, y)) {
                let idx = (row / factor) * geometry.width + col / factor;
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
    }
    counts.into_iter().collect()
}

/// True when the polygon overlaps the cell's interior. A cell that only
/// shares an edge or a vertex with the polygon is not touched.
fn touches_interior(shape: &MultiPolygon<f64>, cell: &Polygon<f64>) -> bool {
    shape.intersects(cell) && !shape.relate(cell).is_touches()
}

fn cell_polygon(t: &Affine, col: f64, row: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            t.apply(col, row),
            t.apply(col + 1.0, row),
            t.apply(col + 1.0, row + 1.0),
            t.apply(col, row + 1.0),
            t.apply(col, row),
        ]),
        vec![],
    )
}

fn value_at(layer: &GridLayer, idx: usize) -> Option<f64> {
    let v = *layer.data().get(idx)?;
    layer.is_valid_value(v).then_some(f64::from(v))
}

fn mean(layer: &GridLayer, cells: &[usize]) -> Option<f64> {
    let (sum, n) = cells
        .iter()
        .filter_map(|&idx| value_at(layer, idx))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn weighted_mean(layer: &GridLayer, cells: &[(usize, u32)]) -> Option<f64> {
    let (sum, weight) = cells
        .iter()
        .filter_map(|&(idx, w)| value_at(layer, idx).map(|v| (v, w)))
        .fold((0.0, 0u64), |(s, n), (v, w)| (s + v * w as f64, n + w as u64));
    (weight > 0).then(|| sum / weight as f64)
}
