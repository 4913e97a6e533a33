//! gridMET bands (variables).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// A gridMET band.
///
/// The short code doubles as the `standard_name` attribute that identifies
/// the data variable inside each yearly NetCDF file, and as the first
/// column header of every output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridmetVariable {
    Bi,
    Erc,
    Etr,
    Fm100,
    Fm1000,
    Pet,
    Pr,
    Rmax,
    Rmin,
    Sph,
    Srad,
    Th,
    Tmmn,
    Tmmx,
    Vpd,
    Vs,
}

impl GridmetVariable {
    pub const ALL: [GridmetVariable; 16] = [
        Self::Bi,
        Self::Erc,
        Self::Etr,
        Self::Fm100,
        Self::Fm1000,
        Self::Pet,
        Self::Pr,
        Self::Rmax,
        Self::Rmin,
        Self::Sph,
        Self::Srad,
        Self::Th,
        Self::Tmmn,
        Self::Tmmx,
        Self::Vpd,
        Self::Vs,
    ];

    /// Short band code, e.g. `tmmx`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bi => "bi",
            Self::Erc => "erc",
            Self::Etr => "etr",
            Self::Fm100 => "fm100",
            Self::Fm1000 => "fm1000",
            Self::Pet => "pet",
            Self::Pr => "pr",
            Self::Rmax => "rmax",
            Self::Rmin => "rmin",
            Self::Sph => "sph",
            Self::Srad => "srad",
            Self::Th => "th",
            Self::Tmmn => "tmmn",
            Self::Tmmx => "tmmx",
            Self::Vpd => "vpd",
            Self::Vs => "vs",
        }
    }

    /// The semantic name matched against the dataset's `standard_name` attributes.
    pub fn standard_name(&self) -> &'static str {
        self.as_str()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Bi => "Burning index: NFDRS fire danger index",
            Self::Erc => "Energy release component: NFDRS fire danger index",
            Self::Etr => "Daily reference evapotranspiration: Alfalfa, mm",
            Self::Fm100 => "100-hour dead fuel moisture: %",
            Self::Fm1000 => "1000-hour dead fuel moisture: %",
            Self::Pet => "Potential evapotranspiration",
            Self::Pr => "Precipitation amount: mm, daily total",
            Self::Rmax => "Maximum relative humidity: %",
            Self::Rmin => "Minimum relative humidity: %",
            Self::Sph => "Specific humidity: kg/kg",
            Self::Srad => "Surface downward shortwave radiation: W/m^2",
            Self::Th => "Wind direction: Degrees clockwise from North",
            Self::Tmmn => "Minimum temperature: K",
            Self::Tmmx => "Maximum temperature: K",
            Self::Vpd => "Mean vapor pressure deficit: kPa",
            Self::Vs => "Wind velocity at 10m: m/s",
        }
    }
}

impl fmt::Display for GridmetVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridmetVariable {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| CommonError::UnknownVariable(s.to_string()))
    }
}
