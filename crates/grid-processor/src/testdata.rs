//! Synthetic gridMET-like datasets with known values.
//!
//! Values follow a simple pattern so tests can predict samples exactly:
//! on the d-th day, cell (row, col) holds `d * 100 + row * width + col`,
//! and the outer ring of cells is no-data.

use chrono::NaiveDate;
use gridmet_common::date_to_day;

use crate::dataset::InMemoryDataset;
use crate::error::Result;
use crate::types::Affine;

/// No-data sentinel used by the synthetic datasets.
pub const SYNTHETIC_NODATA: f32 = -32767.0;

/// Daily layers for `days` consecutive days starting at `start`.
///
/// Cell value is `d * 100 + row * width + col` for the d-th day; the outer
/// ring of cells is no-data on every day. Cells are unit squares with
/// cell (0, 0) spanning [0, 1] x [0, 1].
pub fn synthetic_dataset(
    width: usize,
    height: usize,
    start: NaiveDate,
    days: usize,
    standard_name: &str,
) -> Result<InMemoryDataset> {
    let first = date_to_day(start);
    let time_values = (0..days as i64).map(|d| first + d).collect();
    let slices = (0..days)
        .map(|d| {
            let mut data = Vec::with_capacity(width * height);
            for row in 0..height {
                for col in 0..width {
                    let border = row == 0 || col == 0 || row + 1 == height || col + 1 == width;
                    data.push(if border {
                        SYNTHETIC_NODATA
                    } else {
                        (d * 100 + row * width + col) as f32
                    });
                }
            }
            data
        })
        .collect();

    InMemoryDataset::new(Affine::from_origin(0.0, 0.0, 1.0, 1.0), width, height, time_values)
        .with_nodata(SYNTHETIC_NODATA)
        .with_variable("synthetic_variable", Some(standard_name), slices)
}
