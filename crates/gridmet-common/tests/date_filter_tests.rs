//! Date filter behaviour over a full year of day offsets.

use chrono::{Datelike, NaiveDate};
use gridmet_common::{date_to_day, day_to_date, DateFilter};

fn year_of_days(year: i32) -> Vec<i64> {
    let start = date_to_day(NaiveDate::from_ymd_opt(year, 1, 1).unwrap());
    let end = date_to_day(NaiveDate::from_ymd_opt(year, 12, 31).unwrap());
    (start..=end).collect()
}

#[test]
fn test_summer_months_filter_keeps_only_jja() {
    let filter: DateFilter = "month:6,7,8".parse().unwrap();
    let days = year_of_days(2019);
    let kept: Vec<NaiveDate> = days
        .iter()
        .filter(|d| filter.accept_day(**d))
        .map(|d| day_to_date(*d).unwrap())
        .collect();

    assert_eq!(kept.len(), 30 + 31 + 31);
    assert!(kept.iter().all(|d| (6..=8).contains(&d.month())));
    assert_eq!(kept.first().unwrap(), &NaiveDate::from_ymd_opt(2019, 6, 1).unwrap());
    assert_eq!(kept.last().unwrap(), &NaiveDate::from_ymd_opt(2019, 8, 31).unwrap());
}

#[test]
fn test_leap_day_filter() {
    let filter: DateFilter = "date:02-29".parse().unwrap();
    assert_eq!(year_of_days(2020).into_iter().filter(|d| filter.accept_day(*d)).count(), 1);
    assert_eq!(year_of_days(2019).into_iter().filter(|d| filter.accept_day(*d)).count(), 0);
}

#[test]
fn test_range_filter_is_inclusive() {
    let filter: DateFilter = "2019-12-30:2020-01-02".parse().unwrap();
    let mut days = year_of_days(2019);
    days.extend(year_of_days(2020));
    assert_eq!(days.into_iter().filter(|d| filter.accept_day(*d)).count(), 4);
}
