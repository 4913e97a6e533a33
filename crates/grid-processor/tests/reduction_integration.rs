//! End-to-end reduction over synthetic datasets.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use geo::polygon;
use gridmet_common::DateFilter;
use grid_processor::testdata::synthetic_dataset;
use grid_processor::{
    output_header, Affine, AggregationRecord, CsvSink, GridLayer, GridProcessorError,
    InMemoryDataset, JobState, MemorySink, PointSampler, PolygonEntity, PolygonReducer,
    RasterDataset, RasterSlice, RasterizationStrategy, RecordSink, Result,
    TemporalReductionDriver, VariableDescriptor,
};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn zones() -> Vec<PolygonEntity> {
    vec![
        PolygonEntity::new(
            "84101",
            polygon![(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)],
        ),
        PolygonEntity::new(
            "84102",
            polygon![(x: 3.2, y: 3.2), (x: 4.8, y: 3.2), (x: 4.8, y: 4.8), (x: 3.2, y: 4.8)],
        ),
    ]
}

#[test]
fn test_bilinear_center_of_identity_grid() {
    let layer = GridLayer::new(vec![10.0, 20.0, 30.0, 40.0], 2, 2, Affine::identity(), None)
        .unwrap();
    let sampler = PointSampler::new(Affine::identity(), 2, 2).unwrap();
    assert_eq!(sampler.sample(0.5, 0.5, &layer).unwrap(), Some(25.0));
}

#[test]
fn test_downscale_2x2_to_10x10() {
    let layer = GridLayer::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, Affine::identity(), None).unwrap();
    let fine = layer.disaggregate(5).unwrap();
    assert_eq!(fine.shape(), (10, 10));
    for block_row in 0..2 {
        for block_col in 0..2 {
            let expected = layer.value(block_row, block_col);
            for r in 0..5 {
                for c in 0..5 {
                    assert_eq!(fine.value(block_row * 5 + r, block_col * 5 + c), expected);
                }
            }
        }
    }
}

#[test]
fn test_polygon_job_streams_day_major() {
    let ds = synthetic_dataset(6, 6, date(2020, 1, 1), 3, "tmmx").unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx");
    let mut reducer = PolygonReducer::new(zones(), RasterizationStrategy::CellCenter);
    let mut sink = MemorySink::new();

    let rows = driver.run(&mut reducer, &mut sink).unwrap();
    assert_eq!(rows, 6);
    assert_eq!(driver.state(), JobState::Completed);
    assert_eq!(sink.flushes, 3);

    let labels: Vec<&str> = sink.records.iter().map(|r| r.label[0].as_str()).collect();
    assert_eq!(labels, vec!["84101", "84102", "84101", "84102", "84101", "84102"]);
    let dates: Vec<NaiveDate> = sink.records.iter().map(|r| r.date).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));

    // Cells (1,1), (1,2), (2,1), (2,2) on day 0: 7, 8, 13, 14.
    assert_eq!(sink.records[0].value, Some(10.5));
    assert_eq!(sink.records[2].value, Some(110.5));
    // Cell (3,3) and (4,4) region: centers (3.5,3.5), (4.5,3.5), (3.5,4.5), (4.5,4.5).
    assert_eq!(sink.records[1].value, Some((21.0 + 22.0 + 27.0 + 28.0) / 4.0));
}

#[test]
fn test_month_filter_keeps_summer_only() {
    let ds = synthetic_dataset(3, 3, date(2019, 1, 1), 365, "tmmx").unwrap();
    let filter: DateFilter = "month:6,7,8".parse().unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx").with_date_filter(filter);
    let job = driver.prepare().unwrap();

    assert_eq!(job.days().len(), 30 + 31 + 31);
    assert!(job.days().iter().all(|d| (6..=8).contains(&d.date.month())));
    assert_eq!(job.days()[0].date, date(2019, 6, 1));
    // Filtered days keep their own time index.
    assert_eq!(job.days()[0].time_index, 151);
}

#[test]
fn test_unknown_variable_fails_job() {
    let ds = synthetic_dataset(3, 3, date(2019, 1, 1), 1, "tmmx").unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "pr");
    let err = driver.prepare().unwrap_err();
    assert!(matches!(err, GridProcessorError::VariableNotFound(name) if name == "pr"));
    assert_eq!(driver.state(), JobState::Failed);
}

#[test]
fn test_driver_state_machine() {
    let ds = synthetic_dataset(3, 3, date(2019, 1, 1), 2, "tmmx").unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx");
    assert_eq!(driver.state(), JobState::Initialized);
    driver.prepare().unwrap();
    assert_eq!(driver.state(), JobState::Prepared);
    assert!(matches!(
        driver.prepare(),
        Err(GridProcessorError::InvalidState { .. })
    ));

    let mut reducer = PolygonReducer::new(vec![], RasterizationStrategy::AllTouched);
    driver.run(&mut reducer, &mut MemorySink::new()).unwrap();
    assert_eq!(driver.state(), JobState::Completed);
    assert!(driver.run(&mut reducer, &mut MemorySink::new()).is_err());
}

/// Fails to read any time index at or beyond `fail_from`.
struct FailingDataset {
    inner: InMemoryDataset,
    fail_from: usize,
}

impl RasterDataset for FailingDataset {
    fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        self.inner.variables()
    }

    fn time_values(&self) -> Result<Vec<i64>> {
        self.inner.time_values()
    }

    fn affine_transform(&self) -> Result<Affine> {
        self.inner.affine_transform()
    }

    fn read_slice(&self, variable: &str, time_index: usize) -> Result<RasterSlice> {
        if time_index >= self.fail_from {
            return Err(GridProcessorError::read_failed("disk went away"));
        }
        self.inner.read_slice(variable, time_index)
    }
}

#[test]
fn test_failure_keeps_flushed_days() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmmx_zip_polygon_2020.csv");
    let ds = FailingDataset {
        inner: synthetic_dataset(6, 6, date(2020, 1, 1), 5, "tmmx").unwrap(),
        fail_from: 3,
    };
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx");
    let mut reducer = PolygonReducer::new(zones(), RasterizationStrategy::Combined);
    let mut sink = CsvSink::create(&path).unwrap();
    sink.write_header(&output_header("tmmx", &["zip"])).unwrap();

    let err = driver.run(&mut reducer, &mut sink).unwrap_err();
    assert!(matches!(err, GridProcessorError::ReadFailed(_)));
    assert_eq!(driver.state(), JobState::Failed);

    // Rows for the first three days are already on disk.
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1 + 3 * 2);
    assert!(text.contains("2020-01-03"));
    assert!(!text.contains("2020-01-04"));
}

fn polygon_csv(path: &std::path::Path) -> Vec<u8> {
    let ds = synthetic_dataset(6, 6, date(2020, 1, 1), 4, "tmmx").unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx");
    let mut reducer = PolygonReducer::new(zones(), RasterizationStrategy::Combined);
    let mut sink = CsvSink::create(path).unwrap();
    sink.write_header(&output_header("tmmx", &["zip"])).unwrap();
    driver.run(&mut reducer, &mut sink).unwrap();
    sink.finish().unwrap();
    std::fs::read(path).unwrap()
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempdir().unwrap();
    for name in ["out.csv", "out.csv.gz"] {
        let path = dir.path().join(name);
        let first = polygon_csv(&path);
        let second = polygon_csv(&path);
        assert!(!first.is_empty());
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn test_masked_polygon_yields_empty_value() {
    let ds = synthetic_dataset(6, 6, date(2020, 1, 1), 1, "tmmx").unwrap();
    let mut driver = TemporalReductionDriver::new(Arc::new(ds), "tmmx");
    // Only the masked outer ring.
    let mut reducer = PolygonReducer::new(
        vec![PolygonEntity::new(
            "edge",
            polygon![(x: 0.1, y: 0.1), (x: 0.9, y: 0.1), (x: 0.9, y: 0.9), (x: 0.1, y: 0.9)],
        )],
        RasterizationStrategy::Combined,
    );
    let mut sink = MemorySink::new();
    driver.run(&mut reducer, &mut sink).unwrap();
    let record: &AggregationRecord = &sink.records[0];
    assert_eq!(record.value, None);
    assert_eq!(record.to_fields(), vec!["", "2020-01-01", "edge"]);

    let set: BTreeSet<String> = sink.records.iter().map(|r| r.label[0].clone()).collect();
    assert_eq!(set.len(), 1);
}
