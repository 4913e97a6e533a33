//! Streamed point entities from CSV files (plain or gzip).

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use grid_processor::{is_gzip_path, InputProfile, PointEntity};
use tracing::{debug, instrument};

use crate::error::{EntityError, Result};

/// Which columns of a point file hold what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointColumns {
    /// Longitude (x) column.
    pub x: String,
    /// Latitude (y) column.
    pub y: String,
    /// Carried through to the output; the first is the entity label.
    pub metadata: Vec<String>,
}

impl PointColumns {
    /// Build from `[x, y]` coordinate columns and metadata columns.
    pub fn new(coordinates: &[String], metadata: &[String]) -> Result<Self> {
        match coordinates {
            [x, y] => Ok(Self {
                x: x.clone(),
                y: y.clone(),
                metadata: metadata.to_vec(),
            }),
            _ => Err(EntityError::MissingColumn {
                path: PathBuf::new(),
                column: format!("expected exactly two coordinate columns, got {:?}", coordinates),
            }),
        }
    }

    /// Output label columns: metadata names, lower-cased.
    pub fn label_columns(&self) -> Vec<String> {
        self.metadata.iter().map(|m| m.to_lowercase()).collect()
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).map_err(|e| EntityError::io(path, e))?;
    if is_gzip_path(path) {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A lazy iterator over the point rows of a CSV file.
///
/// Rows are parsed one at a time, so a file far larger than memory can be
/// partitioned by the consumer.
pub struct PointStream {
    path: PathBuf,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    x_idx: usize,
    y_idx: usize,
    meta_idx: Vec<usize>,
    columns: PointColumns,
    rows: u64,
}

impl std::fmt::Debug for PointStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointStream")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .finish()
    }
}

impl PointStream {
    /// Open a point file and resolve its columns against the header.
    #[instrument(skip(path, columns), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, columns: PointColumns) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(open_reader(&path)?);

        let headers = reader.headers()?.clone();
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| EntityError::MissingColumn {
                    path: path.clone(),
                    column: column.to_string(),
                })
        };

        let x_idx = find(&columns.x)?;
        let y_idx = find(&columns.y)?;
        let meta_idx = columns
            .metadata
            .iter()
            .map(|m| find(m))
            .collect::<Result<Vec<_>>>()?;

        debug!(x = x_idx, y = y_idx, metadata = ?meta_idx, "Resolved point columns");
        Ok(Self {
            path,
            records: reader.into_records(),
            x_idx,
            y_idx,
            meta_idx,
            columns,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &PointColumns {
        &self.columns
    }

    /// Rows consumed so far.
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    fn parse(&self, record: &csv::StringRecord) -> Result<PointEntity> {
        let line = record.position().map_or(0, |p| p.line());
        let coordinate = |idx: usize, column: &str| {
            let raw = record.get(idx).unwrap_or("").trim();
            raw.parse::<f64>().map_err(|_| EntityError::InvalidCoordinate {
                column: column.to_string(),
                value: raw.to_string(),
                line,
            })
        };

        let x = coordinate(self.x_idx, &self.columns.x)?;
        let y = coordinate(self.y_idx, &self.columns.y)?;
        let metadata = self
            .meta_idx
            .iter()
            .map(|&i| record.get(i).unwrap_or("").to_string())
            .collect();
        Ok(PointEntity::new(x, y, metadata))
    }
}

impl Iterator for PointStream {
    type Item = Result<PointEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        self.rows += 1;
        Some(self.parse(&record))
    }
}

/// Count newline-terminated lines, decompressing gzip input.
pub fn count_lines<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path = path.as_ref();
    let mut reader = BufReader::with_capacity(1 << 16, open_reader(path)?);
    let mut lines = 0u64;
    let mut last = b'\n';
    loop {
        let buf = reader.fill_buf().map_err(|e| EntityError::io(path, e))?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last = buf[buf.len() - 1];
        let consumed = buf.len();
        reader.consume(consumed);
    }
    if last != b'\n' {
        lines += 1;
    }
    Ok(lines)
}

/// Size facts about a point file for scheduling: on-disk size, data rows
/// (header excluded) and whether it is gzip-compressed.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn profile_point_file<P: AsRef<Path>>(path: P) -> Result<InputProfile> {
    let path = path.as_ref();
    let file_size = std::fs::metadata(path)
        .map_err(|e| EntityError::io(path, e))?
        .len();
    let point_count = count_lines(path)?.saturating_sub(1) as usize;
    let profile = InputProfile {
        file_size,
        point_count,
        is_compressed: is_gzip_path(path),
    };
    debug!(?profile, "Profiled point file");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_utils::generators::write_point_csv;

    fn columns() -> PointColumns {
        PointColumns::new(
            &["lon".to_string(), "lat".to_string()],
            &["Site".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_columns_require_two_coordinates() {
        assert!(PointColumns::new(&["lon".to_string()], &[]).is_err());
        assert_eq!(columns().label_columns(), vec!["site".to_string()]);
    }

    #[test]
    fn test_stream_reads_plain_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv");
        write_point_csv(
            &path,
            &["Site", "lat", "lon"],
            &[vec!["a", "40.5", "-111.9"], vec!["b", "42.3", "-71.0"]],
        )
        .unwrap();

        let mut stream = PointStream::open(&path, columns()).unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first, PointEntity::new(-111.9, 40.5, vec!["a".into()]));
        let second = stream.next().unwrap().unwrap();
        assert_eq!(second.metadata, vec!["b".to_string()]);
        assert!(stream.next().is_none());
        assert_eq!(stream.rows_read(), 2);
    }

    #[test]
    fn test_stream_reads_gzip_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv.gz");
        write_point_csv(&path, &["Site", "lat", "lon"], &[vec!["z", "1.0", "2.0"]]).unwrap();

        let points: Vec<_> = PointStream::open(&path, columns())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(points, vec![PointEntity::new(2.0, 1.0, vec!["z".into()])]);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv");
        write_point_csv(&path, &["Site", "latitude", "lon"], &[vec!["a", "1", "2"]]).unwrap();

        let err = PointStream::open(&path, columns()).unwrap_err();
        assert!(matches!(err, EntityError::MissingColumn { ref column, .. } if column == "lat"));
    }

    #[test]
    fn test_invalid_coordinate_carries_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv");
        write_point_csv(
            &path,
            &["Site", "lat", "lon"],
            &[vec!["a", "1", "2"], vec!["b", "", "2"]],
        )
        .unwrap();

        let results: Vec<_> = PointStream::open(&path, columns()).unwrap().collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(EntityError::InvalidCoordinate { column, line, .. }) => {
                assert_eq!(column, "lat");
                assert_eq!(*line, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_profile_counts_rows_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv.gz");
        let rows = test_utils::generators::create_point_rows(25, (-120.0, 30.0, -80.0, 45.0));
        write_point_csv(&path, &["id", "lat", "lon"], &rows).unwrap();

        let profile = profile_point_file(&path).unwrap();
        assert_eq!(profile.point_count, 25);
        assert!(profile.is_compressed);
        assert!(profile.file_size > 0);
    }
}
