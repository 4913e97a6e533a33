//! Shapefile entities: polygons, or point sites for ZIP point files.

use std::path::Path;

use geo::{MultiPoint, Point};
use grid_processor::{PolygonEntity, ZoneGeometry};
use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;
use tracing::{debug, info, instrument, warn};

use crate::error::{EntityError, Result};

/// Load every polygon or point record of a shapefile, labelled by the first
/// attribute in `label_fields` that the record carries.
///
/// Point and multipoint records become sites that take the value of the
/// cell containing them. Null shapes are skipped with a warning. Any other
/// shape type is an error.
#[instrument(skip(path, label_fields), fields(path = %path.as_ref().display()))]
pub fn load_polygons<P: AsRef<Path>>(path: P, label_fields: &[&str]) -> Result<Vec<PolygonEntity>> {
    let path = path.as_ref();
    let shapes = shapefile::read(path).map_err(|e| EntityError::Shapefile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut polygons = Vec::with_capacity(shapes.len());
    for (index, (shape, record)) in shapes.into_iter().enumerate() {
        let geometry = match shape {
            Shape::Polygon(p) => ZoneGeometry::Area(p.into()),
            Shape::PolygonM(p) => ZoneGeometry::Area(p.into()),
            Shape::PolygonZ(p) => ZoneGeometry::Area(p.into()),
            Shape::Point(p) => sites([(p.x, p.y)]),
            Shape::PointM(p) => sites([(p.x, p.y)]),
            Shape::PointZ(p) => sites([(p.x, p.y)]),
            Shape::Multipoint(m) => sites(m.points().iter().map(|p| (p.x, p.y))),
            Shape::MultipointM(m) => sites(m.points().iter().map(|p| (p.x, p.y))),
            Shape::MultipointZ(m) => sites(m.points().iter().map(|p| (p.x, p.y))),
            Shape::NullShape => {
                warn!(index, "Skipping null shape");
                continue;
            }
            other => {
                return Err(EntityError::Shapefile {
                    path: path.to_path_buf(),
                    message: format!("record {} is a {:?}, expected a polygon or point", index, other.shapetype()),
                })
            }
        };

        let label = record_label(&record, label_fields).ok_or_else(|| EntityError::MissingLabel {
            path: path.to_path_buf(),
            index,
            fields: label_fields.join(", "),
        })?;
        let parts = match &geometry {
            ZoneGeometry::Area(area) => area.0.len(),
            ZoneGeometry::Sites(points) => points.0.len(),
        };
        debug!(index, label = %label, parts, "Loaded entity");
        polygons.push(PolygonEntity {
            label,
            geometry,
        });
    }

    info!(count = polygons.len(), "Loaded shapefile entities");
    Ok(polygons)
}

fn sites(points: impl IntoIterator<Item = (f64, f64)>) -> ZoneGeometry {
    ZoneGeometry::Sites(MultiPoint::new(
        points.into_iter().map(|(x, y)| Point::new(x, y)).collect(),
    ))
}

/// The label of a record: the first present, non-empty field among `fields`.
pub fn record_label(record: &Record, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|name| record.get(name))
        .find_map(render_field)
}

/// Render an attribute as a label. Integral numbers lose their fraction so
/// that a numeric ZIP of `2138.0` reads `2138`.
pub fn render_field(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        FieldValue::Numeric(Some(n)) => Some(render_number(*n)),
        FieldValue::Float(Some(n)) => Some(render_number(*n as f64)),
        FieldValue::Double(n) => Some(render_number(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_number() {
        assert_eq!(render_number(2138.0), "2138");
        assert_eq!(render_number(-4.0), "-4");
        assert_eq!(render_number(2.5), "2.5");
    }

    #[test]
    fn test_render_field_variants() {
        assert_eq!(
            render_field(&FieldValue::Character(Some(" 02138 ".into()))),
            Some("02138".to_string())
        );
        assert_eq!(render_field(&FieldValue::Character(Some("  ".into()))), None);
        assert_eq!(render_field(&FieldValue::Character(None)), None);
        assert_eq!(render_field(&FieldValue::Numeric(Some(25017.0))), Some("25017".into()));
        assert_eq!(render_field(&FieldValue::Integer(7)), Some("7".into()));
        assert_eq!(render_field(&FieldValue::Logical(Some(true))), None);
    }

    #[test]
    fn test_record_label_prefers_first_present_field() {
        let mut record = Record::default();
        record.insert("GEOID".to_string(), FieldValue::Character(Some("25017".into())));
        record.insert("FIPS".to_string(), FieldValue::Numeric(Some(25025.0)));

        assert_eq!(record_label(&record, &["FIPS", "GEOID"]), Some("25025".into()));
        assert_eq!(record_label(&record, &["ZIP", "GEOID"]), Some("25017".into()));
        assert_eq!(record_label(&record, &["ZIP"]), None);
    }
}
