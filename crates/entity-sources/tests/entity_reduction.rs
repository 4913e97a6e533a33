//! Entities read from disk reduce against a synthetic grid.

use std::sync::Arc;

use chrono::NaiveDate;
use entity_sources::{find_shape_file, load_polygons, PointColumns, PointStream};
use gridmet_common::{Geography, Shape};
use grid_processor::testdata::synthetic_dataset;
use grid_processor::{
    AdaptivePointScheduler, ExecutionMode, MemorySink, PolygonReducer, RasterizationStrategy,
    SchedulerConfig, TemporalReductionDriver, ZoneGeometry,
};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use tempfile::TempDir;
use test_utils::generators::write_point_csv;

fn driver() -> TemporalReductionDriver {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let ds = synthetic_dataset(5, 5, start, 2, "tmmx").unwrap();
    TemporalReductionDriver::new(Arc::new(ds), "tmmx")
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y1),
        Point::new(x1, y1),
        Point::new(x1, y0),
        Point::new(x0, y0),
    ]))
}

fn write_zip_shapefile(dir: &std::path::Path, year: i32) -> std::path::PathBuf {
    let folder = dir.join(year.to_string()).join("zip").join("polygon");
    std::fs::create_dir_all(&folder).unwrap();
    let path = folder.join(entity_sources::esri_file_name(year));

    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("ZIP").unwrap(), 10);
    let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
    for (zip, poly) in [
        ("84101", square(1.0, 1.0, 3.0, 3.0)),
        ("84102", square(2.0, 2.0, 4.0, 4.0)),
    ] {
        let mut record = Record::default();
        record.insert("ZIP".to_string(), FieldValue::Character(Some(zip.to_string())));
        writer.write_shape_and_record(&poly, &record).unwrap();
    }
    drop(writer);
    path
}

#[test]
fn test_discovered_shapefile_reduces_to_zonal_means() {
    let dir = TempDir::new().unwrap();
    write_zip_shapefile(dir.path(), 2018);

    let path = find_shape_file(dir.path(), 2020, Geography::Zip, Shape::Polygon).unwrap();
    let polygons = load_polygons(&path, Geography::Zip.label_fields()).unwrap();
    assert_eq!(polygons.len(), 2);
    assert_eq!(polygons[0].label, "84101");

    let mut reducer = PolygonReducer::new(polygons, RasterizationStrategy::CellCenter);
    let mut sink = MemorySink::new();
    driver().run(&mut reducer, &mut sink).unwrap();

    let rows: Vec<_> = sink
        .records
        .iter()
        .map(|r| (r.label[0].clone(), r.value))
        .collect();
    // Cells (1..3, 1..3) hold 6, 7, 11, 12; cells (2..4, 2..4) hold 12, 13, 17, 18.
    assert_eq!(
        rows,
        vec![
            ("84101".to_string(), Some(9.0)),
            ("84102".to_string(), Some(15.0)),
            ("84101".to_string(), Some(109.0)),
            ("84102".to_string(), Some(115.0)),
        ]
    );
}

fn write_zip_point_shapefile(dir: &std::path::Path, year: i32) -> std::path::PathBuf {
    let folder = dir.join(year.to_string()).join("zip").join("point");
    std::fs::create_dir_all(&folder).unwrap();
    let path = folder.join("zip_points.shp");

    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("ZIP").unwrap(), 10);
    let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
    for (zip, site) in [
        ("84101", Point::new(1.5, 1.5)),
        ("84102", Point::new(3.2, 2.7)),
        ("84103", Point::new(0.5, 0.5)),
    ] {
        let mut record = Record::default();
        record.insert("ZIP".to_string(), FieldValue::Character(Some(zip.to_string())));
        writer.write_shape_and_record(&site, &record).unwrap();
    }
    drop(writer);
    path
}

#[test]
fn test_point_shapefile_takes_containing_cell() {
    let dir = TempDir::new().unwrap();
    write_zip_point_shapefile(dir.path(), 2020);

    let path = find_shape_file(dir.path(), 2020, Geography::Zip, Shape::Point).unwrap();
    let sites = load_polygons(&path, Geography::Zip.label_fields()).unwrap();
    assert_eq!(sites.len(), 3);
    assert!(matches!(sites[0].geometry, ZoneGeometry::Sites(_)));

    // Strategy does not matter for sites.
    let mut reducer = PolygonReducer::new(sites, RasterizationStrategy::AllTouched);
    let mut sink = MemorySink::new();
    driver().run(&mut reducer, &mut sink).unwrap();

    let rows: Vec<_> = sink
        .records
        .iter()
        .take(3)
        .map(|r| (r.label[0].clone(), r.value))
        .collect();
    // (1.5, 1.5) is in cell 6, (3.2, 2.7) in cell 13, (0.5, 0.5) in the nodata border.
    assert_eq!(
        rows,
        vec![
            ("84101".to_string(), Some(6.0)),
            ("84102".to_string(), Some(13.0)),
            ("84103".to_string(), None),
        ]
    );
}

#[test]
fn test_point_file_streams_through_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sites.csv.gz");
    write_point_csv(
        &path,
        &["Name", "Latitude", "Longitude"],
        &[vec!["center", "2.5", "2.5"], vec!["off-grid", "40.0", "-111.0"]],
    )
    .unwrap();

    let columns = PointColumns::new(
        &["Longitude".to_string(), "Latitude".to_string()],
        &["Name".to_string()],
    )
    .unwrap();
    let stream = PointStream::open(&path, columns).unwrap();

    let scheduler = AdaptivePointScheduler::new(SchedulerConfig {
        out_of_bounds: grid_processor::OutOfBoundsPolicy::Skip,
        ..Default::default()
    })
    .unwrap();
    let mut driver = driver();
    let mut sink = MemorySink::new();
    let summary = scheduler
        .run(
            &mut driver,
            stream.map(|r| r.map_err(Into::into)),
            ExecutionMode::InMemory,
            &mut sink,
        )
        .unwrap();

    assert_eq!(summary.points_read, 2);
    assert_eq!(summary.points_used, 1);
    let values: Vec<_> = sink.records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![Some(12.0), Some(112.0)]);
    assert_eq!(&*sink.records[0].label, &["center".to_string()]);
}
