//! Raster dataset abstraction.
//!
//! A dataset exposes named variables over a shared time axis and a single
//! affine transform. Implementations must allow `read_slice` from several
//! threads; formats without concurrent readers serialize internally.

use std::collections::HashMap;

use crate::error::{GridProcessorError, Result};
use crate::layer::GridLayer;
use crate::types::Affine;

/// Metadata for one dataset variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    /// Internal variable name.
    pub name: String,
    /// Semantic name attribute (`standard_name`), if present.
    pub standard_name: Option<String>,
    pub dimensions: Vec<String>,
}

/// One 2-D slice read from a dataset, row-major.
#[derive(Debug, Clone)]
pub struct RasterSlice {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub nodata: Option<f32>,
}

impl RasterSlice {
    /// Pair the slice with a transform.
    pub fn into_layer(self, transform: Affine) -> Result<GridLayer> {
        GridLayer::new(self.data, self.width, self.height, transform, self.nodata)
    }
}

/// Read access to a gridded time series.
pub trait RasterDataset: Send + Sync {
    /// All variables in the dataset.
    fn variables(&self) -> Result<Vec<VariableDescriptor>>;

    /// Time axis values as integer day offsets from the calendar epoch.
    fn time_values(&self) -> Result<Vec<i64>>;

    /// Edge-registered transform shared by every time step.
    fn affine_transform(&self) -> Result<Affine>;

    /// Read one time step of a variable.
    fn read_slice(&self, variable: &str, time_index: usize) -> Result<RasterSlice>;

    /// Day offset for a single time index.
    fn time_index_to_value(&self, index: usize) -> Result<i64> {
        self.time_values()?.get(index).copied().ok_or_else(|| {
            GridProcessorError::read_failed(format!("time index {} out of range", index))
        })
    }

    /// Names of all variables.
    fn variable_names(&self) -> Result<Vec<String>> {
        Ok(self.variables()?.into_iter().map(|v| v.name).collect())
    }

    /// Short human-readable description used in logs.
    fn describe(&self) -> String {
        "raster dataset".to_string()
    }
}

/// Resolve a semantic variable name to the dataset's internal name.
///
/// Matches the `standard_name` attribute, never the raw name.
pub fn resolve_variable(dataset: &dyn RasterDataset, standard_name: &str) -> Result<String> {
    dataset
        .variables()?
        .into_iter()
        .find(|v| v.standard_name.as_deref() == Some(standard_name))
        .map(|v| v.name)
        .ok_or_else(|| GridProcessorError::VariableNotFound(standard_name.to_string()))
}

/// Dataset held entirely in memory. Used for synthetic data and tests.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    transform: Affine,
    width: usize,
    height: usize,
    time_values: Vec<i64>,
    nodata: Option<f32>,
    variables: Vec<VariableDescriptor>,
    slices: HashMap<String, Vec<Vec<f32>>>,
}

impl InMemoryDataset {
    pub fn new(transform: Affine, width: usize, height: usize, time_values: Vec<i64>) -> Self {
        Self {
            transform,
            width,
            height,
            time_values,
            nodata: None,
            variables: Vec::new(),
            slices: HashMap::new(),
        }
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Add a variable with one slice per time value.
    pub fn with_variable(
        mut self,
        name: &str,
        standard_name: Option<&str>,
        slices: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if slices.len() != self.time_values.len() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "variable {} has {} slices for {} time steps",
                name,
                slices.len(),
                self.time_values.len()
            )));
        }
        if let Some(bad) = slices.iter().find(|s| s.len() != self.width * self.height) {
            return Err(GridProcessorError::invalid_metadata(format!(
                "variable {} slice has {} values, expected {}",
                name,
                bad.len(),
                self.width * self.height
            )));
        }
        self.variables.push(VariableDescriptor {
            name: name.to_string(),
            standard_name: standard_name.map(str::to_string),
            dimensions: vec!["day".into(), "lat".into(), "lon".into()],
        });
        self.slices.insert(name.to_string(), slices);
        Ok(self)
    }
}

impl RasterDataset for InMemoryDataset {
    fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        Ok(self.variables.clone())
    }

    fn time_values(&self) -> Result<Vec<i64>> {
        Ok(self.time_values.clone())
    }

    fn affine_transform(&self) -> Result<Affine> {
        Ok(self.transform)
    }

    fn read_slice(&self, variable: &str, time_index: usize) -> Result<RasterSlice> {
        let slices = self
            .slices
            .get(variable)
            .ok_or_else(|| GridProcessorError::VariableNotFound(variable.to_string()))?;
        let data = slices.get(time_index).ok_or_else(|| {
            GridProcessorError::read_failed(format!("time index {} out of range", time_index))
        })?;
        Ok(RasterSlice {
            data: data.clone(),
            width: self.width,
            height: self.height,
            nodata: self.nodata,
        })
    }

    fn describe(&self) -> String {
        format!(
            "in-memory {}x{} x {} days",
            self.width,
            self.height,
            self.time_values.len()
        )
    }
}
