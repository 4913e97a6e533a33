//! Native NetCDF reading using the netcdf library.
//!
//! Metadata (variables, time axis, transform) is read once at open. Slices
//! are read by reopening the file under a process-wide lock, since the
//! underlying HDF5 library is not safe for concurrent access.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use grid_processor::{Affine, RasterDataset, RasterSlice, VariableDescriptor};
use tracing::debug;

use crate::coords::affine_from_coordinates;
use crate::error::{NetCdfError, NetCdfResult};
use crate::unpack::Packing;

/// Serializes every libnetcdf call made through this module.
static NETCDF_LOCK: Mutex<()> = Mutex::new(());

/// Names tried, in order, for each coordinate axis.
const TIME_NAMES: &[&str] = &["day", "time"];
const LAT_NAMES: &[&str] = &["lat", "latitude"];
const LON_NAMES: &[&str] = &["lon", "longitude"];

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 prints diagnostics even for errors the caller handles, e.g. probing
/// optional attributes. Call once early in `main()`; repeated calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// A gridMET NetCDF file exposed as a [`RasterDataset`].
#[derive(Debug)]
pub struct NetCdfDataset {
    path: PathBuf,
    variables: Vec<VariableDescriptor>,
    time_values: Vec<i64>,
    transform: Affine,
    width: usize,
    height: usize,
}

impl NetCdfDataset {
    /// Open a file and read its metadata.
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref().to_path_buf();
        let _guard = lock()?;
        let file = open_file(&path)?;

        let variables = file
            .variables()
            .map(|var| VariableDescriptor {
                name: var.name(),
                standard_name: get_string_attr(&var, "standard_name"),
                dimensions: var.dimensions().iter().map(|d| d.name()).collect(),
            })
            .collect();

        let time_values = read_axis(&file, TIME_NAMES)?
            .into_iter()
            .map(|d| d.round() as i64)
            .collect::<Vec<_>>();
        let lat = read_axis(&file, LAT_NAMES)?;
        let lon = read_axis(&file, LON_NAMES)?;
        let transform = affine_from_coordinates(&lon, &lat)?;

        debug!(
            path = %path.display(),
            days = time_values.len(),
            width = lon.len(),
            height = lat.len(),
            "Opened NetCDF dataset"
        );

        Ok(Self {
            path,
            variables,
            time_values,
            transform,
            width: lon.len(),
            height: lat.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, variable: &str, time_index: usize) -> NetCdfResult<RasterSlice> {
        if time_index >= self.time_values.len() {
            return Err(NetCdfError::InvalidFormat(format!(
                "time index {} out of range ({} steps)",
                time_index,
                self.time_values.len()
            )));
        }

        let _guard = lock()?;
        let file = open_file(&self.path)?;
        let var = file
            .variable(variable)
            .ok_or_else(|| NetCdfError::MissingData(format!("{} variable", variable)))?;

        let raw: Vec<f64> = var
            .get_values((time_index, .., ..))
            .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to read {}: {}", variable, e)))?;
        if raw.len() != self.width * self.height {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} slice has {} values, expected {}x{}",
                variable,
                raw.len(),
                self.width,
                self.height
            )));
        }

        let packing = Packing {
            scale_factor: get_f64_attr(&var, "scale_factor").unwrap_or(1.0),
            add_offset: get_f64_attr(&var, "add_offset").unwrap_or(0.0),
            fill_value: get_f64_attr(&var, "_FillValue"),
            missing_value: get_f64_attr(&var, "missing_value"),
        };

        Ok(RasterSlice {
            data: packing.unpack(&raw),
            width: self.width,
            height: self.height,
            nodata: None,
        })
    }
}

impl RasterDataset for NetCdfDataset {
    fn variables(&self) -> grid_processor::Result<Vec<VariableDescriptor>> {
        Ok(self.variables.clone())
    }

    fn time_values(&self) -> grid_processor::Result<Vec<i64>> {
        Ok(self.time_values.clone())
    }

    fn affine_transform(&self) -> grid_processor::Result<Affine> {
        Ok(self.transform)
    }

    fn read_slice(&self, variable: &str, time_index: usize) -> grid_processor::Result<RasterSlice> {
        Ok(self.read(variable, time_index)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn lock() -> NetCdfResult<std::sync::MutexGuard<'static, ()>> {
    NETCDF_LOCK
        .lock()
        .map_err(|_| NetCdfError::InvalidFormat("netcdf lock poisoned".to_string()))
}

fn open_file(path: &Path) -> NetCdfResult<netcdf::File> {
    netcdf::open(path).map_err(|e| {
        NetCdfError::InvalidFormat(format!("Failed to open NetCDF {}: {}", path.display(), e))
    })
}

fn read_axis(file: &netcdf::File, names: &[&str]) -> NetCdfResult<Vec<f64>> {
    let var = names
        .iter()
        .find_map(|name| file.variable(name))
        .ok_or_else(|| NetCdfError::MissingData(format!("{} variable", names.join("/"))))?;
    var.get_values(..)
        .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e)))
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
