use crate::error::{Result, RevenueScheduleError};
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

pub fn next_month_end(date: NaiveDate) -> Option<NaiveDate> {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };

    let month = if date.month() == 12 {
        1
    } else {
        date.month() + 1
    };

    last_day_of_month(year, month)
}

/// Month-end dates for `count` consecutive months, beginning with the month
/// that contains `start`.
pub fn month_ends_from(start: NaiveDate, count: u32) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::with_capacity(count as usize);
    if count == 0 {
        return Ok(dates);
    }

    let out_of_range = || {
        RevenueScheduleError::invalid_input(
            None,
            format!("Contract starting {} runs past the supported calendar", start),
        )
    };

    let mut current = last_day_of_month(start.year(), start.month()).ok_or_else(out_of_range)?;
    dates.push(current);
    for _ in 1..count {
        current = next_month_end(current).ok_or_else(out_of_range)?;
        dates.push(current);
    }

    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_end() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let next = next_month_end(date).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());

        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let next = next_month_end(date).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 4),
            NaiveDate::from_ymd_opt(2023, 4, 30)
        );
    }

    #[test]
    fn test_month_ends_from_mid_month_start() {
        let start = NaiveDate::from_ymd_opt(2023, 11, 15).unwrap();
        let dates = month_ends_from(start, 4).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2023, 11, 30).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            ]
        );
    }

    #[test]
    fn test_month_ends_from_covers_whole_term() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = month_ends_from(start, 36).unwrap();
        assert_eq!(dates.len(), 36);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(dates[35], NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());

        assert!(month_ends_from(start, 0).unwrap().is_empty());
    }
}
