//! Test data generators for synthetic climate grids and point files.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Creates a grid with daily maximum temperature-like values in Kelvin.
///
/// Values range from about 260K in the first row to 310K in the last,
/// constant along each row.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let t = if height > 1 {
            row as f32 / (height - 1) as f32
        } else {
            0.0
        };
        let temp = 260.0 + t * 50.0;
        data.extend(std::iter::repeat(temp).take(width));
    }
    data
}

/// Creates a grid where each cell equals `row * width + col`.
///
/// With an identity transform this makes zonal means easy to predict.
pub fn create_index_grid(width: usize, height: usize) -> Vec<f32> {
    (0..width * height).map(|i| i as f32).collect()
}

/// Creates a constant-value grid.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replaces the outer ring of a grid with `sentinel`, like ocean cells
/// around a land mask.
pub fn mask_border(data: &mut [f32], width: usize, height: usize, sentinel: f32) {
    for row in 0..height {
        for col in 0..width {
            if row == 0 || col == 0 || row + 1 == height || col + 1 == width {
                data[row * width + col] = sentinel;
            }
        }
    }
}

/// Writes a CSV point file. A `.gz` suffix gzip-compresses it.
///
/// # Example
///
/// ```ignore
/// write_point_csv(&path, &["site", "lat", "lon"], &[vec!["a", "40.7", "-111.9"]])?;
/// ```
pub fn write_point_csv<S: AsRef<str>>(
    path: &Path,
    header: &[&str],
    rows: &[Vec<S>],
) -> io::Result<()> {
    let file = File::create(path)?;
    let gz = path.extension().map_or(false, |e| e == "gz");
    let sink: Box<dyn Write> = if gz {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(file)
    };

    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.iter().map(|f| f.as_ref()))?;
    }
    writer.flush()?;
    // Dropping the encoder writes the gzip trailer.
    drop(writer);
    Ok(())
}

/// Generates `count` points on a regular lattice inside the given box,
/// as `[id, lat, lon]` rows.
pub fn create_point_rows(
    count: usize,
    (min_lon, min_lat, max_lon, max_lat): (f64, f64, f64, f64),
) -> Vec<Vec<String>> {
    let side = (count as f64).sqrt().ceil().max(1.0) as usize;
    let dx = (max_lon - min_lon) / side as f64;
    let dy = (max_lat - min_lat) / side as f64;
    (0..count)
        .map(|i| {
            let lon = min_lon + (i % side) as f64 * dx + dx / 2.0;
            let lat = min_lat + (i / side) as f64 * dy + dy / 2.0;
            vec![format!("p{:05}", i), format!("{:.6}", lat), format!("{:.6}", lon)]
        })
        .collect()
}
