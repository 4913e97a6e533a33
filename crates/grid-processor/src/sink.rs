//! Output sinks for aggregation records.
//!
//! Rows are `[value, date, label...]`; a missing value is an empty field.
//! Files ending in `.gz` are gzip-compressed.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};

use crate::error::{GridProcessorError, Result};
use crate::types::AggregationRecord;

/// Append-only destination for aggregation records.
pub trait RecordSink: Send {
    /// Write the header row. Sinks appending to existing output skip it.
    fn write_header(&mut self, header: &[String]) -> Result<()>;

    /// Append records in order.
    fn write_records(&mut self, records: &[AggregationRecord]) -> Result<()>;

    /// Make everything written so far durable.
    fn flush(&mut self) -> Result<()>;
}

/// Build the header row for a variable and its label columns.
pub fn output_header<S: AsRef<str>>(variable: &str, label_columns: &[S]) -> Vec<String> {
    let mut header = Vec::with_capacity(2 + label_columns.len());
    header.push(variable.to_string());
    header.push("date".to_string());
    header.extend(label_columns.iter().map(|c| c.as_ref().to_string()));
    header
}

/// Whether a path selects gzip output.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
}

/// Byte stream under the CSV writer.
enum OutputStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputStream {
    fn finish(self) -> std::io::Result<()> {
        match self {
            OutputStream::Plain(mut w) => w.flush(),
            OutputStream::Gzip(gz) => gz.finish()?.flush(),
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputStream::Plain(w) => w.write(buf),
            OutputStream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputStream::Plain(w) => w.flush(),
            OutputStream::Gzip(w) => w.flush(),
        }
    }
}

/// CSV file sink, optionally gzip-compressed.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<OutputStream>,
    skip_header: bool,
    rows: u64,
}

impl CsvSink {
    /// Create (truncating) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), false)
    }

    /// Append to the output file; the header is not repeated when the
    /// file already has content.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), true)
    }

    fn open(path: &Path, append: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let existing = append
            && std::fs::metadata(path)
                .map(|m| m.len() > 0)
                .unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| GridProcessorError::sink(format!("{}: {}", path.display(), e)))?;
        let buffered = BufWriter::new(file);

        let stream = if is_gzip_path(path) {
            OutputStream::Gzip(GzBuilder::new().mtime(0).write(buffered, Compression::default()))
        } else {
            OutputStream::Plain(buffered)
        };

        let writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(stream);

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            skip_header: existing,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written through this sink.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and close the file, writing the gzip trailer if any.
    pub fn finish(self) -> Result<()> {
        let stream = self
            .writer
            .into_inner()
            .map_err(|e| GridProcessorError::sink(e.to_string()))?;
        stream.finish()?;
        Ok(())
    }
}

impl RecordSink for CsvSink {
    fn write_header(&mut self, header: &[String]) -> Result<()> {
        if self.skip_header {
            return Ok(());
        }
        self.writer.write_record(header)?;
        self.skip_header = true;
        Ok(())
    }

    fn write_records(&mut self, records: &[AggregationRecord]) -> Result<()> {
        for record in records {
            self.writer.write_record(record.to_fields())?;
        }
        self.rows += records.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink that keeps records in memory. Workers collect into one of these
/// before their rows are drained to the real output.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub header: Option<Vec<String>>,
    pub records: Vec<AggregationRecord>,
    pub flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> Vec<AggregationRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    fn write_header(&mut self, header: &[String]) -> Result<()> {
        if self.header.is_none() {
            self.header = Some(header.to_vec());
        }
        Ok(())
    }

    fn write_records(&mut self, records: &[AggregationRecord]) -> Result<()> {
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn records() -> Vec<AggregationRecord> {
        let date = NaiveDate::from_ymd_opt(2020, 7, 4).unwrap();
        vec![
            AggregationRecord::new(Some(301.5), date, vec!["84101".to_string()].into()),
            AggregationRecord::new(None, date, Arc::from(vec!["84102".to_string()])),
        ]
    }

    #[test]
    fn test_header_row() {
        assert_eq!(
            output_header("tmmx", &["zip"]),
            vec!["tmmx", "date", "zip"]
        );
    }

    #[test]
    fn test_csv_sink_plain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_header(&output_header("tmmx", &["zip"])).unwrap();
        sink.write_records(&records()).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.rows_written(), 2);
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "tmmx,date,zip\n301.5,2020-07-04,84101\n,2020-07-04,84102\n");
    }

    #[test]
    fn test_csv_sink_gzip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv.gz");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_header(&output_header("tmmx", &["zip"])).unwrap();
        sink.write_records(&records()).unwrap();
        sink.finish().unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.starts_with("tmmx,date,zip\n301.5,"));
    }

    #[test]
    fn test_append_skips_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        for _ in 0..2 {
            let mut sink = CsvSink::append(&path).unwrap();
            sink.write_header(&output_header("tmmx", &["zip"])).unwrap();
            sink.write_records(&records()[..1]).unwrap();
            sink.finish().unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("tmmx,date,zip").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_records(&records()).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.flushes, 1);
        assert_eq!(sink.into_records().len(), 2);
    }
}
