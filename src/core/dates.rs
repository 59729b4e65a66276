//! Conversions between calendar dates and ordinal day numbers.
//!
//! Ordinal dates count days in the proleptic Gregorian calendar with
//! 0001-01-01 as day 1.

use crate::error::{Result, YatsmError};
use chrono::{Datelike, NaiveDate};

/// Ordinal day number of a calendar date.
pub fn to_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// Calendar date of an ordinal day number.
pub fn from_ordinal(ordinal: i64) -> Result<NaiveDate> {
    i32::try_from(ordinal)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| YatsmError::InvalidParameter(format!("ordinal date {ordinal} out of range")))
}

/// Ordinal date of a year/month/day triple.
pub fn ordinal_from_ymd(year: i32, month: u32, day: u32) -> Result<i64> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(to_ordinal)
        .ok_or_else(|| {
            YatsmError::InvalidParameter(format!("invalid calendar date {year}-{month}-{day}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_day_one_is_first_of_common_era() {
        assert_eq!(ordinal_from_ymd(1, 1, 1).unwrap(), 1);
    }

    #[test]
    fn known_ordinal() {
        // 2000-01-01 is ordinal day 730120
        assert_eq!(ordinal_from_ymd(2000, 1, 1).unwrap(), 730_120);
    }

    #[test]
    fn round_trips_through_calendar() {
        let ordinal = ordinal_from_ymd(2007, 8, 8).unwrap();
        let date = from_ordinal(ordinal).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2007, 8, 8));
    }

    #[test]
    fn rejects_invalid_dates() {
        assert!(ordinal_from_ymd(2001, 2, 29).is_err());
        assert!(from_ordinal(i64::MAX).is_err());
    }
}
