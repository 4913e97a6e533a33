//! Masked-aware bilinear sampling of a layer at geographic points.
//!
//! The sampler works in *sample space*: its transform maps an array index
//! directly to the coordinate of that sample. Layers carry edge-registered
//! transforms, so [`PointSampler::for_layer`] shifts by half a cell first.
//!
//! ```text
//!   ul (r0+1, c0) ─────── ur (r0+1, c0+1)
//!        │                    │
//!        │       • (x, y)     │      x, y ∈ [0, 1)
//!        │                    │
//!   ll (r0, c0) ────────── lr (r0, c0+1)
//! ```

use gridmet_common::BoundingBox;

use crate::error::{GridProcessorError, Result};
use crate::layer::GridLayer;
use crate::types::{Affine, MaskState};

/// The 2x2 block of samples around a point plus the offset inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    /// Row of the lower-left corner.
    pub row: isize,
    /// Column of the lower-left corner.
    pub col: isize,
    /// Fractional column offset in [0, 1).
    pub x: f64,
    /// Fractional row offset in [0, 1).
    pub y: f64,
}

impl SampleWindow {
    /// Corner (row, col) indices in ll, lr, ul, ur order.
    pub fn corners(&self) -> [(isize, isize); 4] {
        let (r, c) = (self.row, self.col);
        [(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)]
    }

    /// Bilinear weights matching [`SampleWindow::corners`].
    pub fn weights(&self) -> [f64; 4] {
        let (x, y) = (self.x, self.y);
        [
            (1.0 - x) * (1.0 - y),
            x * (1.0 - y),
            (1.0 - x) * y,
            x * y,
        ]
    }
}

/// Locates points on a grid and interpolates values around them.
#[derive(Debug, Clone)]
pub struct PointSampler {
    transform: Affine,
    width: usize,
    height: usize,
    /// Coverage of the grid, half a sample beyond the outermost samples.
    extent: BoundingBox,
}

impl PointSampler {
    /// Create a sampler from a sample-registered transform and grid shape.
    pub fn new(transform: Affine, width: usize, height: usize) -> Result<Self> {
        if !transform.is_invertible() {
            return Err(GridProcessorError::invalid_metadata(
                "sampler transform is not invertible",
            ));
        }
        if width == 0 || height == 0 {
            return Err(GridProcessorError::invalid_metadata(
                "sampler grid must not be empty",
            ));
        }
        let (w, h) = (width as f64 - 0.5, height as f64 - 0.5);
        let extent = BoundingBox::from_corners(
            [(-0.5, -0.5), (w, -0.5), (-0.5, h), (w, h)].map(|(c, r)| transform.apply(c, r)),
        );
        Ok(Self {
            transform,
            width,
            height,
            extent,
        })
    }

    /// Sampler whose samples sit at the cell centers of `layer`.
    pub fn for_layer(layer: &GridLayer) -> Result<Self> {
        let sampler = Self::new(
            layer.transform().sample_registered(),
            layer.width(),
            layer.height(),
        )?;
        Ok(Self {
            extent: layer.extent(),
            ..sampler
        })
    }

    pub fn transform(&self) -> &Affine {
        &self.transform
    }

    /// Area within which points can be located.
    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    /// Find the 2x2 window enclosing (x, y).
    ///
    /// Points further than half a cell outside the outermost samples are
    /// rejected; positions are never clamped.
    pub fn locate(&self, x: f64, y: f64) -> Result<SampleWindow> {
        let (fcol, frow) = self.transform.inverse(x, y)?;

        let max_col = self.width as f64 - 0.5;
        let max_row = self.height as f64 - 0.5;
        let inside = fcol.is_finite()
            && frow.is_finite()
            && (-0.5..=max_col).contains(&fcol)
            && (-0.5..=max_row).contains(&frow);
        if !inside {
            return Err(GridProcessorError::out_of_bounds(x, y, self.extent));
        }

        let c0 = fcol.floor();
        let r0 = frow.floor();
        Ok(SampleWindow {
            row: r0 as isize,
            col: c0 as isize,
            x: fcol - c0,
            y: frow - r0,
        })
    }

    /// Classify the window's corners.
    ///
    /// A corner is invalid when either the snapshot or the current layer
    /// marks it as no-data, or when it falls outside the array. The fallback
    /// for a partially masked window is the valid corner with the largest
    /// bilinear weight, ties going to the earlier corner (ll first).
    pub fn classify_mask(
        &self,
        window: &SampleWindow,
        snapshot: &GridLayer,
        layer: &GridLayer,
    ) -> MaskState {
        let mut invalid = 0;
        let mut fallback: Option<((isize, isize), f64)> = None;
        for (corner, weight) in window.corners().into_iter().zip(window.weights()) {
            let (row, col) = corner;
            if !(snapshot.is_valid(row, col) && layer.is_valid(row, col)) {
                invalid += 1;
                continue;
            }
            if fallback.map_or(true, |(_, best)| weight > best) {
                fallback = Some((corner, weight));
            }
        }

        match (invalid, fallback) {
            (0, _) => MaskState::Unmasked,
            (_, Some((fallback, _))) => MaskState::PartiallyMasked { fallback },
            (_, None) => MaskState::CompletelyMasked,
        }
    }

    /// Interpolate a value for a classified window on `layer`.
    ///
    /// A partially masked window returns the fallback corner's value rather
    /// than a renormalised partial interpolation.
    pub fn interpolate(
        &self,
        window: &SampleWindow,
        mask: MaskState,
        layer: &GridLayer,
    ) -> Option<f64> {
        match mask {
            MaskState::CompletelyMasked => None,
            MaskState::PartiallyMasked { fallback: (row, col) } => layer.value(row, col),
            MaskState::Unmasked => {
                let mut value = 0.0;
                for ((row, col), w) in window.corners().into_iter().zip(window.weights()) {
                    value += layer.value(row, col)? * w;
                }
                Some(value)
            }
        }
    }

    /// Locate, classify against `layer` itself, and interpolate.
    pub fn sample(&self, x: f64, y: f64, layer: &GridLayer) -> Result<Option<f64>> {
        let window = self.locate(x, y)?;
        let mask = self.classify_mask(&window, layer, layer);
        Ok(self.interpolate(&window, mask, layer))
    }
}
