//! CF packing: `value = raw * scale_factor + add_offset`.

/// Packing attributes of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub scale_factor: f64,
    pub add_offset: f64,
    /// Raw `_FillValue`.
    pub fill_value: Option<f64>,
    /// Raw `missing_value`.
    pub missing_value: Option<f64>,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
            fill_value: None,
            missing_value: None,
        }
    }
}

impl Packing {
    fn is_missing(&self, raw: f64) -> bool {
        !raw.is_finite()
            || self.fill_value.map_or(false, |f| raw == f)
            || self.missing_value.map_or(false, |m| raw == m)
    }

    /// Unpack raw values; fill and missing values become NaN.
    pub fn unpack(&self, raw: &[f64]) -> Vec<f32> {
        raw.iter()
            .map(|&v| {
                if self.is_missing(v) {
                    f32::NAN
                } else {
                    (v * self.scale_factor + self.add_offset) as f32
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_scaled() {
        let packing = Packing {
            scale_factor: 0.1,
            add_offset: 220.0,
            fill_value: Some(32767.0),
            missing_value: None,
        };
        let out = packing.unpack(&[0.0, 800.0, 32767.0]);
        assert_eq!(out[0], 220.0);
        assert!((out[1] - 300.0).abs() < 1e-4);
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_default_is_identity() {
        let out = Packing::default().unpack(&[1.5, f64::NAN]);
        assert_eq!(out[0], 1.5);
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_missing_value() {
        let packing = Packing {
            missing_value: Some(-9999.0),
            ..Default::default()
        };
        assert!(packing.unpack(&[-9999.0])[0].is_nan());
    }
}
