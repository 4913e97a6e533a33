//! YAML data model describing the pipeline's output tables.
//!
//! One table per geography and band, `{geography}_{band}`, holding the
//! band value, the observation date and the geography label.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use gridmet_common::{Geography, GridmetVariable};
use serde::Serialize;
use tracing::info;

const DOMAIN: &str = "gridmet";
const DATE_COLUMN: &str = "observation_date";

/// CSV quoting mode of the output files as a Python `csv` constant
/// (`QUOTE_NONE`).
const QUOTING_NONE: u8 = 3;

#[derive(Debug, Serialize)]
pub struct Domain {
    pub schema: String,
    pub index: String,
    pub description: String,
    pub header: bool,
    pub quoting: u8,
    pub tables: BTreeMap<String, Table>,
}

#[derive(Debug, Serialize)]
pub struct Table {
    pub columns: Vec<BTreeMap<String, Column>>,
    pub primary_key: Vec<String>,
    pub indices: BTreeMap<String, Index>,
}

#[derive(Debug, Serialize)]
pub struct Column {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Index {
    pub columns: Vec<String>,
}

fn column(name: &str, kind: &str, source: Option<&str>) -> BTreeMap<String, Column> {
    BTreeMap::from([(
        name.to_string(),
        Column {
            kind: kind.to_string(),
            source: source.map(str::to_string),
        },
    )])
}

fn table(geography: Geography, band: GridmetVariable) -> Table {
    let geo = geography.as_str();
    Table {
        columns: vec![
            column(band.as_str(), "numeric", None),
            column(DATE_COLUMN, "date", Some("date")),
            column(geo, "int", None),
        ],
        primary_key: vec![geo.to_string(), DATE_COLUMN.to_string()],
        indices: BTreeMap::from([(
            "dt_geo_idx".to_string(),
            Index {
                columns: vec![DATE_COLUMN.to_string(), geo.to_string()],
            },
        )]),
    }
}

/// The full data model, keyed by domain name.
pub fn data_model() -> BTreeMap<String, Domain> {
    let tables = Geography::ALL
        .iter()
        .flat_map(|&geo| {
            GridmetVariable::ALL
                .iter()
                .map(move |&band| (format!("{}_{}", geo.as_str(), band.as_str()), table(geo, band)))
        })
        .collect();

    BTreeMap::from([(
        DOMAIN.to_string(),
        Domain {
            schema: DOMAIN.to_string(),
            index: "all".to_string(),
            description: "Data model for gridMET aggregations".to_string(),
            header: true,
            quoting: QUOTING_NONE,
            tables,
        },
    )])
}

pub fn create_yaml() -> Result<String> {
    serde_yaml::to_string(&data_model()).context("Failed to serialize data model")
}

/// Write the data model to `path`.
pub fn write_registry(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, create_yaml()?)
        .with_context(|| format!("Failed to write registry {}", path.display()))?;
    info!(path = %path.display(), "Registry written");
    Ok(())
}
