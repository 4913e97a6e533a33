//! Bounding box of a raster's coverage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An axis-aligned box in the dataset's coordinate system.
///
/// gridMET grids are in geographic WGS84, so coordinates are degrees
/// (x = longitude, y = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box covering the four corners of a (possibly flipped)
    /// quadrilateral, such as a grid mapped through its transform.
    pub fn from_corners(corners: [(f64, f64); 4]) -> Self {
        let (x0, y0) = corners[0];
        corners[1..]
            .iter()
            .fold(Self::new(x0, y0, x0, y0), |bbox, &(x, y)| Self {
                min_x: bbox.min_x.min(x),
                min_y: bbox.min_y.min(y),
                max_x: bbox.max_x.max(x),
                max_y: bbox.max_y.max(y),
            })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners() {
        let bbox = BoundingBox::from_corners([(3.0, -1.0), (-2.0, 4.0), (0.5, 0.5), (1.0, 1.0)]);
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 3.0, 4.0));
    }

    #[test]
    fn test_display() {
        let bbox = BoundingBox::new(-124.8, 25.0, -67.0, 49.4);
        assert_eq!(bbox.to_string(), "[-124.8, -67] x [25, 49.4]");
    }
}
