//! Locating the shapefile for a year.
//!
//! Shapefiles are organised as `{shapes_dir}/{year}/{geography}/{shape}/`.
//! Boundaries change slowly, so a year without its own file borrows the
//! closest earlier year, or failing that the closest later one.

use std::fs;
use std::path::{Path, PathBuf};

use gridmet_common::{Geography, Shape};
use tracing::{debug, info};

use crate::error::{EntityError, Result};

/// Years outside this open interval are never searched.
pub const MIN_SHAPE_YEAR: i32 = 1980;
pub const MAX_SHAPE_YEAR: i32 = 2021;

/// Conventional ESRI file name of a year's ZIP polygons.
pub fn esri_file_name(year: i32) -> String {
    format!("ESRI{:02}USZIP5_POLY_WGS84.shp", year.rem_euclid(100))
}

/// The shapefile for exactly `year`, if one is present.
///
/// The conventional ESRI name wins; otherwise the first `.shp` file in
/// name order is used.
pub fn check_shape_file(
    shapes_dir: &Path,
    year: i32,
    geography: Geography,
    shape: Shape,
) -> Option<PathBuf> {
    let dir = shapes_dir
        .join(year.to_string())
        .join(geography.as_str())
        .join(shape.as_str());
    if !dir.is_dir() {
        return None;
    }

    let conventional = dir.join(esri_file_name(year));
    if conventional.is_file() {
        return Some(conventional);
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(&dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("shp"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// The shapefile for the year closest to `year`: same year first, then
/// searching backwards, then forwards.
pub fn find_shape_file(
    shapes_dir: &Path,
    year: i32,
    geography: Geography,
    shape: Shape,
) -> Result<PathBuf> {
    let in_range = |y: i32| y > MIN_SHAPE_YEAR && y < MAX_SHAPE_YEAR;

    for step in [-1, 1] {
        let mut y = year;
        while in_range(y) {
            if let Some(path) = check_shape_file(shapes_dir, y, geography, shape) {
                if y != year {
                    info!(requested = year, found = y, path = %path.display(), "Using shapefile from nearest year");
                } else {
                    debug!(year, path = %path.display(), "Found shapefile");
                }
                return Ok(path);
            }
            y += step;
        }
    }

    Err(EntityError::ShapeFileNotFound {
        root: shapes_dir.to_path_buf(),
        year,
        geography: geography.to_string(),
        shape: shape.to_string(),
    })
}
