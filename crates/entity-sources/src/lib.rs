//! Readers for the entities gridMET values are reduced to.
//!
//! - [`polygons`]: zip code or county polygons (or ZIP point sites) from
//!   ESRI shapefiles, labelled by an attribute column.
//! - [`points`]: point rows streamed from CSV (optionally gzip), with
//!   named coordinate and metadata columns.
//! - [`discovery`]: the shapefile for a year, falling back to the nearest
//!   year that has one.

pub mod discovery;
pub mod error;
pub mod points;
pub mod polygons;

pub use discovery::{check_shape_file, esri_file_name, find_shape_file};
pub use error::{EntityError, Result};
pub use points::{count_lines, profile_point_file, PointColumns, PointStream};
pub use polygons::{load_polygons, record_label, render_field};
