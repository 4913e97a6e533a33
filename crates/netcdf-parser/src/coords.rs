//! Transforms derived from 1-D coordinate variables.

use grid_processor::Affine;

use crate::error::{NetCdfError, NetCdfResult};

/// Relative tolerance for treating coordinate steps as equal.
const SPACING_TOLERANCE: f64 = 1e-4;

/// Edge-registered transform for a regular lon/lat grid.
///
/// The coordinate vectors hold cell centers; the transform maps
/// (col, row) = (0, 0) to the outer corner of the first cell. A
/// descending latitude axis yields a negative `e`.
pub fn affine_from_coordinates(lon: &[f64], lat: &[f64]) -> NetCdfResult<Affine> {
    let dlon = regular_step("lon", lon)?;
    let dlat = regular_step("lat", lat)?;
    Ok(Affine::new(
        dlon,
        0.0,
        lon[0] - dlon / 2.0,
        0.0,
        dlat,
        lat[0] - dlat / 2.0,
    ))
}

fn regular_step(name: &str, values: &[f64]) -> NetCdfResult<f64> {
    if values.len() < 2 {
        return Err(NetCdfError::InvalidFormat(format!(
            "coordinate {} needs at least 2 values, found {}",
            name,
            values.len()
        )));
    }
    let step = (values[values.len() - 1] - values[0]) / (values.len() - 1) as f64;
    if step == 0.0 || !step.is_finite() {
        return Err(NetCdfError::InvalidFormat(format!(
            "coordinate {} has zero or non-finite spacing",
            name
        )));
    }
    for (i, pair) in values.windows(2).enumerate() {
        let d = pair[1] - pair[0];
        if ((d - step) / step).abs() > SPACING_TOLERANCE {
            return Err(NetCdfError::InvalidFormat(format!(
                "coordinate {} is irregular at index {}: step {} vs {}",
                name, i, d, step
            )));
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_gridmet_like_axes() {
        let step = 1.0 / 24.0;
        let lon: Vec<f64> = (0..10).map(|i| -124.766667 + i as f64 * step).collect();
        let lat: Vec<f64> = (0..5).map(|i| 49.4 - i as f64 * step).collect();
        let t = affine_from_coordinates(&lon, &lat).unwrap();
        assert_approx_eq!(t.a, step, 1e-12);
        assert_approx_eq!(t.e, -step, 1e-12);
        assert_approx_eq!(t.c, -124.766667 - step / 2.0, 1e-9);
        assert_approx_eq!(t.f, 49.4 + step / 2.0, 1e-9);

        // Center of cell (row 2, col 3) lands on the coordinate values.
        let (x, y) = t.apply(3.5, 2.5);
        assert_approx_eq!(x, lon[3], 1e-9);
        assert_approx_eq!(y, lat[2], 1e-9);
    }

    #[test]
    fn test_irregular_axis_rejected() {
        let lat = [0.0, 1.0, 2.0];
        assert!(affine_from_coordinates(&[0.0, 1.0, 3.0], &lat).is_err());
        assert!(affine_from_coordinates(&[0.0], &lat).is_err());
        assert!(affine_from_coordinates(&[1.0, 1.0], &lat).is_err());
    }
}
