//! Common types and utilities shared across the gridMET pipeline crates.

pub mod bbox;
pub mod error;
pub mod geography;
pub mod time;
pub mod variable;

pub use bbox::BoundingBox;
pub use error::{CommonError, CommonResult};
pub use geography::{Geography, Shape};
pub use time::{date_to_day, day_to_date, parse_years, DateFilter, DAY_EPOCH};
pub use variable::GridmetVariable;
