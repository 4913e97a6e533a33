//! One daily slice of a raster variable.

use gridmet_common::BoundingBox;

use crate::error::{GridProcessorError, Result};
use crate::types::Affine;

/// Immutable 2-D array of samples for one variable on one time step.
///
/// Data is stored row-major (`row * width + col`). The transform is
/// edge-registered: `(col, row)` maps to the cell's outer corner, so
/// `(col + 0.5, row + 0.5)` is the cell center.
#[derive(Debug, Clone)]
pub struct GridLayer {
    data: Vec<f32>,
    width: usize,
    height: usize,
    transform: Affine,
    nodata: Option<f32>,
}

impl GridLayer {
    /// Create a layer, checking the buffer matches the declared shape.
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: Affine,
        nodata: Option<f32>,
    ) -> Result<Self> {
        if data.len() != width * height {
            return Err(GridProcessorError::invalid_metadata(format!(
                "layer buffer has {} values, expected {}x{}={}",
                data.len(),
                width,
                height,
                width * height
            )));
        }
        if !transform.is_invertible() {
            return Err(GridProcessorError::invalid_metadata(
                "layer transform is not invertible",
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (height, width), in array order.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn transform(&self) -> &Affine {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Approximate heap size of the sample buffer.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Whether a raw sample counts as data.
    #[inline]
    pub fn is_valid_value(&self, v: f32) -> bool {
        v.is_finite() && self.nodata.map_or(true, |nd| v != nd)
    }

    /// Raw sample at (row, col), or `None` when outside the array.
    #[inline]
    pub fn get(&self, row: isize, col: isize) -> Option<f32> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Valid sample at (row, col); no-data and out-of-array both yield `None`.
    #[inline]
    pub fn value(&self, row: isize, col: isize) -> Option<f64> {
        self.get(row, col)
            .filter(|v| self.is_valid_value(*v))
            .map(f64::from)
    }

    #[inline]
    pub fn is_valid(&self, row: isize, col: isize) -> bool {
        self.value(row, col).is_some()
    }

    /// Geographic extent covered by the cell edges.
    pub fn extent(&self) -> BoundingBox {
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .map(|(col, row)| self.transform.apply(col, row));
        BoundingBox::from_corners(corners)
    }

    /// Expand every cell into a `factor x factor` block of identical values.
    ///
    /// The pixel-size terms of the transform are divided by `factor`, so the
    /// refined layer covers the same geographic extent.
    pub fn disaggregate(&self, factor: usize) -> Result<GridLayer> {
        if factor == 0 {
            return Err(GridProcessorError::ConfigError(
                "disaggregation factor must be positive".to_string(),
            ));
        }
        if factor == 1 {
            return Ok(self.clone());
        }

        let out_w = self.width * factor;
        let out_h = self.height * factor;
        let mut out = Vec::with_capacity(out_w * out_h);
        for row in 0..self.height {
            let src = &self.data[row * self.width..(row + 1) * self.width];
            let mut line = Vec::with_capacity(out_w);
            for &v in src {
                line.extend(std::iter::repeat(v).take(factor));
            }
            for _ in 0..factor {
                out.extend_from_slice(&line);
            }
        }

        GridLayer::new(
            out,
            out_w,
            out_h,
            self.transform.refined(factor),
            self.nodata,
        )
    }
}
