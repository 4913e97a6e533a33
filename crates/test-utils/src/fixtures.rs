//! Common test fixtures for gridMET tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in gridMET processing.

/// Common bounding box definitions for testing, as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// gridMET coverage of the contiguous United States
    pub const GRIDMET_CONUS: (f64, f64, f64, f64) = (-124.7875, 25.0458, -67.0375, 49.4208);

    /// Salt Lake valley
    pub const SALT_LAKE: (f64, f64, f64, f64) = (-112.1, 40.5, -111.7, 40.9);
}

/// Common grid specifications for testing.
pub mod grid {
    /// gridMET 1/24 degree grid
    pub const GRIDMET: GridSpec = GridSpec {
        width: 1386,
        height: 585,
        min_lon: -124.7875,
        max_lon: -67.0375,
        min_lat: 25.0458,
        max_lat: 49.4208,
    };

    /// Simple 10x10 test grid
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: -10.0,
        max_lon: 10.0,
        min_lat: -10.0,
        max_lat: 10.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Returns the resolution in degrees.
        pub fn resolution(&self) -> (f64, f64) {
            let dx = (self.max_lon - self.min_lon) / self.width as f64;
            let dy = (self.max_lat - self.min_lat) / self.height as f64;
            (dx, dy)
        }

        /// Returns the bounding box as (min_lon, min_lat, max_lon, max_lat).
        pub fn bbox(&self) -> (f64, f64, f64, f64) {
            (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
        }
    }
}

/// Common time values for testing.
pub mod time {
    /// gridMET day offset of 2020-01-01 (days since 1900-01-01)
    pub const DAY_2020_01_01: i64 = 43829;
}

/// Sample sites as (id, lat, lon).
pub mod sites {
    pub const SALT_LAKE_CITY: (&str, f64, f64) = ("slc", 40.7608, -111.8910);
    pub const BOSTON: (&str, f64, f64) = ("bos", 42.3601, -71.0589);
    /// Outside the gridMET extent
    pub const HONOLULU: (&str, f64, f64) = ("hnl", 21.3069, -157.8583);
}
