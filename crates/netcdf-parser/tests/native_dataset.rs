//! Reads a real gridMET file when one is available.
//!
//! Place e.g. `tmmx_2020.nc` under `crates/netcdf-parser/testdata/` or
//! point `TEST_DATA_DIR` at it; otherwise these tests skip.

#![cfg(feature = "native")]

use grid_processor::{resolve_variable, RasterDataset};
use netcdf_parser::NetCdfDataset;
use test_utils::require_test_file;

#[test]
fn test_open_gridmet_file() {
    let path = require_test_file!("tmmx_2020.nc");
    let ds = NetCdfDataset::open(&path).unwrap();

    let name = resolve_variable(&ds, "tmmx").unwrap();
    assert_eq!(name, "air_temperature");

    let days = ds.time_values().unwrap();
    assert_eq!(days.len(), 366);
    // 2020-01-01 since 1900-01-01
    assert_eq!(days[0], 43829);

    let t = ds.affine_transform().unwrap();
    assert!(t.e < 0.0, "latitude axis should descend");

    let slice = ds.read_slice(&name, 0).unwrap();
    assert_eq!(slice.data.len(), slice.width * slice.height);
    assert!(slice.data.iter().any(|v| v.is_nan()), "ocean cells are fill");
    assert!(slice.data.iter().filter(|v| v.is_finite()).all(|v| *v > 200.0 && *v < 350.0));
}
