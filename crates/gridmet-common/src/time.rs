//! Day-offset calendar and date filtering for daily gridMET time series.
//!
//! gridMET stores its time axis as whole days since 1900-01-01. Everything
//! downstream (filters, output rows) works on calendar dates, so the
//! conversion lives here.

use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{CommonError, CommonResult};

/// Origin of the `day` coordinate in gridMET files.
pub const DAY_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1900, 1, 1) {
    Some(date) => date,
    None => panic!("invalid epoch"),
};

/// Convert a day offset from [`DAY_EPOCH`] to a calendar date.
pub fn day_to_date(day: i64) -> Option<NaiveDate> {
    DAY_EPOCH.checked_add_signed(Duration::try_days(day)?)
}

/// Convert a calendar date to its day offset from [`DAY_EPOCH`].
pub fn date_to_day(date: NaiveDate) -> i64 {
    (date - DAY_EPOCH).num_days()
}

/// Predicate over calendar dates, parsed from a `--dates` specification.
///
/// Accepted forms:
/// - `YYYY-MM-DD:YYYY-MM-DD` inclusive range (either side may be empty)
/// - `dayofmonth:1,15` day of month
/// - `month:6,7,8` month number
/// - `date:07-04,12-25` month and day (leading zeros optional)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilter {
    Range {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
    },
    DayOfMonth(Vec<u32>),
    Month(Vec<u32>),
    MonthDay(Vec<(u32, u32)>),
}

impl DateFilter {
    /// Returns true when the date passes the filter.
    pub fn accept(&self, date: NaiveDate) -> bool {
        match self {
            DateFilter::Range { min, max } => {
                if matches!(min, Some(min) if date < *min) {
                    return false;
                }
                !matches!(max, Some(max) if date > *max)
            }
            DateFilter::DayOfMonth(days) => days.contains(&date.day()),
            DateFilter::Month(months) => months.contains(&date.month()),
            DateFilter::MonthDay(pairs) => pairs.contains(&(date.month(), date.day())),
        }
    }

    /// Accept a day offset from [`DAY_EPOCH`]. Offsets outside chrono's range never pass.
    pub fn accept_day(&self, day: i64) -> bool {
        day_to_date(day).map(|d| self.accept(d)).unwrap_or(false)
    }
}

impl FromStr for DateFilter {
    type Err = CommonError;

    fn from_str(spec: &str) -> CommonResult<Self> {
        let (kind, values) = spec
            .split_once(':')
            .ok_or_else(|| CommonError::invalid_filter(spec, "filter spec must include ':'"))?;

        match kind.trim().to_lowercase().as_str() {
            "dayofmonth" => Ok(DateFilter::DayOfMonth(parse_numbers(spec, values, 1..=31)?)),
            "month" => Ok(DateFilter::Month(parse_numbers(spec, values, 1..=12)?)),
            "date" => {
                let mut pairs = Vec::new();
                for value in split_values(values) {
                    let (m, d) = value.split_once('-').ok_or_else(|| {
                        CommonError::invalid_filter(spec, format!("expected MM-DD, got '{}'", value))
                    })?;
                    let month = parse_number(spec, m, 1..=12)?;
                    let day = parse_number(spec, d, 1..=31)?;
                    pairs.push((month, day));
                }
                Ok(DateFilter::MonthDay(pairs))
            }
            _ => {
                let min = parse_bound(spec, kind)?;
                let max = parse_bound(spec, values)?;
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(CommonError::invalid_filter(spec, "range start is after range end"));
                    }
                }
                Ok(DateFilter::Range { min, max })
            }
        }
    }
}

fn split_values(values: &str) -> impl Iterator<Item = &str> {
    values.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(spec: &str, value: &str, range: std::ops::RangeInclusive<u32>) -> CommonResult<u32> {
    let n: u32 = value
        .trim()
        .parse()
        .map_err(|_| CommonError::invalid_filter(spec, format!("'{}' is not a number", value)))?;
    if !range.contains(&n) {
        return Err(CommonError::invalid_filter(
            spec,
            format!("{} is outside {}..={}", n, range.start(), range.end()),
        ));
    }
    Ok(n)
}

fn parse_numbers(spec: &str, values: &str, range: std::ops::RangeInclusive<u32>) -> CommonResult<Vec<u32>> {
    let numbers = split_values(values)
        .map(|v| parse_number(spec, v, range.clone()))
        .collect::<CommonResult<Vec<_>>>()?;
    if numbers.is_empty() {
        return Err(CommonError::invalid_filter(spec, "no values given"));
    }
    Ok(numbers)
}

fn parse_bound(spec: &str, value: &str) -> CommonResult<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| CommonError::invalid_filter(spec, format!("'{}': {}", value, e)))
}

/// Expand year arguments such as `["1992:1995", "1998"]` into a sorted,
/// de-duplicated list of years.
pub fn parse_years<S: AsRef<str>>(args: &[S]) -> CommonResult<Vec<i32>> {
    let mut years = Vec::new();
    for arg in args {
        for token in arg.as_ref().split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let parse = |s: &str| {
                s.trim()
                    .parse::<i32>()
                    .map_err(|_| CommonError::InvalidYears(token.to_string()))
            };
            match token.split_once(':') {
                Some((start, end)) => {
                    let (start, end) = (parse(start)?, parse(end)?);
                    if start > end {
                        return Err(CommonError::InvalidYears(token.to_string()));
                    }
                    years.extend(start..=end);
                }
                None => years.push(parse(token)?),
            }
        }
    }
    years.sort_unstable();
    years.dedup();
    Ok(years)
}
