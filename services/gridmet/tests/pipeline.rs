//! A planned task reduces polygons and points into one output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use gridmet_common::GridmetVariable;
use gridmet_service::{GridmetConfig, GridmetTask, RunArgs};
use grid_processor::testdata::synthetic_dataset;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use test_utils::generators::write_point_csv;

fn write_shapefile(path: &Path) {
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("ZIP").unwrap(), 10);
    let mut writer = shapefile::Writer::from_path(path, table).unwrap();
    let square = Polygon::new(PolygonRing::Outer(vec![
        Point::new(1.0, 1.0),
        Point::new(1.0, 3.0),
        Point::new(3.0, 3.0),
        Point::new(3.0, 1.0),
        Point::new(1.0, 1.0),
    ]));
    let mut record = Record::default();
    record.insert("ZIP".to_string(), FieldValue::Character(Some("84101".to_string())));
    writer.write_shape_and_record(&square, &record).unwrap();
}

fn plan(dir: &Path, compress: bool) -> GridmetTask {
    let shape_file = dir.join("zips.shp");
    write_shapefile(&shape_file);
    let points = dir.join("sites.csv");
    write_point_csv(
        &points,
        &["Name", "Latitude", "Longitude"],
        &[vec!["center", "2.5", "2.5"]],
    )
    .unwrap();
    let raw = dir.join("tmmx_2020.nc");
    std::fs::write(&raw, b"").unwrap();

    let args = RunArgs {
        variables: vec!["tmmx".into()],
        years: vec!["2020".into()],
        strategy: Some("default".into()),
        destination: Some(dir.join("out")),
        raw_downloads: Some(raw),
        shapes: vec!["polygon".into(), "point".into()],
        shape_files: vec![shape_file],
        points: Some(points),
        coordinates: vec!["Longitude".into(), "Latitude".into()],
        metadata: vec!["Name".into()],
        compress,
        ..Default::default()
    };
    let config = Arc::new(GridmetConfig::resolve(&args).unwrap());
    GridmetTask::new(config, 2020, GridmetVariable::Tmmx, "http://unused/tmmx_2020.nc").unwrap()
}

fn dataset() -> Arc<grid_processor::InMemoryDataset> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    Arc::new(synthetic_dataset(5, 5, start, 2, "tmmx").unwrap())
}

#[test]
fn test_polygons_then_points_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let task = plan(dir.path(), false);
    assert_eq!(task.download_url, None);
    assert_eq!(task.output, dir.path().join("out").join("tmmx_zip_all_2020.csv"));

    let report = task.compute(dataset()).unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.compute_tasks, 2);

    let text = std::fs::read_to_string(&report.output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "tmmx,date,zip",
            "9.0,2020-01-01,84101",
            "109.0,2020-01-02,84101",
            "12.0,2020-01-01,center",
            "112.0,2020-01-02,center",
        ]
    );
}

#[test]
fn test_compressed_output_reads_back() {
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let task = plan(dir.path(), true);
    let report = task.compute(dataset()).unwrap();
    assert_eq!(
        report.output,
        PathBuf::from(dir.path().join("out").join("tmmx_zip_all_2020.csv.gz"))
    );

    let file = std::fs::File::open(&report.output).unwrap();
    let mut text = String::new();
    flate2::read::MultiGzDecoder::new(file)
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text.lines().count(), 5);
    assert!(text.starts_with("tmmx,date,zip\n"));
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let task = plan(dir.path(), true);
    let first = task.compute(dataset()).unwrap();
    let a = std::fs::read(&first.output).unwrap();
    let second = task.compute(dataset()).unwrap();
    let b = std::fs::read(&second.output).unwrap();
    assert_eq!(a, b);
}
