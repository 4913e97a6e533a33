//! NetCDF-4 reader for gridMET daily grids.
//!
//! gridMET files carry one variable on a `(day, lat, lon)` grid. The `day`
//! axis counts days since 1900-01-01, the `lat`/`lon` axes hold cell-center
//! coordinates, and data variables are identified by their `standard_name`
//! attribute (the band name, e.g. `tmmx`).
//!
//! The format-independent pieces ([`affine_from_coordinates`], [`Packing`])
//! are always built. Direct file reading needs the `native` feature and the
//! system libraries `libhdf5-dev libnetcdf-dev`.

pub mod coords;
pub mod error;
#[cfg(feature = "native")]
pub mod native;
pub mod unpack;

pub use coords::affine_from_coordinates;
pub use error::{NetCdfError, NetCdfResult};
#[cfg(feature = "native")]
pub use native::{silence_hdf5_errors, NetCdfDataset};
pub use unpack::Packing;
