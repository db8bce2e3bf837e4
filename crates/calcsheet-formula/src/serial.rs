//! Excel-style 1900-system serial date arithmetic, including the historical
//! "1900 is a leap year" bug (serial 60 is the fictional 1900-02-29).

use chrono::{Datelike, Duration, NaiveDate};

fn is_leap_gregorian(year: i32) -> bool {
    (year % 4 == 0) && ((year % 100 != 0) || (year % 400 == 0))
}

fn days_in_month_1900(year: i32, month: u32) -> i64 {
    match month {
        1 => 31,
        2 => {
            if year == 1900 || is_leap_gregorian(year) {
                29
            } else {
                28
            }
        }
        3 => 31,
        4 => 30,
        5 => 31,
        6 => 30,
        7 => 31,
        8 => 31,
        9 => 30,
        10 => 31,
        11 => 30,
        12 => 31,
        _ => 30,
    }
}

/// Convert a calendar date to its 1900-system Excel serial number
/// (1900-01-01 == 1).
pub fn date_to_serial(date: NaiveDate) -> i64 {
    let base = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
    let raw = (date - base).num_days();
    if date >= NaiveDate::from_ymd_opt(1900, 3, 1).unwrap() {
        raw + 1
    } else {
        raw
    }
}

/// Convert a 1900-system Excel serial number back to a calendar date.
/// Returns `None` for the fictional serial 60 (1900-02-29 does not exist as
/// a `NaiveDate`) and for out-of-range serials.
pub fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    if serial == 60 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 31)?;
    let adjusted = if serial > 60 { serial - 1 } else { serial };
    base.checked_add_signed(Duration::days(adjusted))
}

/// `DATE(year, month, day)` semantics: years 0..1899 shift to 1900..3799,
/// and month/day values outside their normal range roll over into
/// neighboring months/years (e.g. month 13 becomes January of the next
/// year, day 0 becomes the last day of the previous month).
pub fn normalize_ymd(mut year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return None;
    }

    // Roll the month into range, carrying whole years.
    let mut y = year;
    let mut m = month;
    while m < 1 {
        m += 12;
        y -= 1;
    }
    while m > 12 {
        m -= 12;
        y += 1;
    }

    let mut serial = {
        let start_of_month_serial = {
            // Days strictly before y-m-01.
            let mut days = 0i64;
            if y >= 1900 {
                for yy in 1900..y {
                    days += if yy == 1900 || is_leap_gregorian(yy) { 366 } else { 365 };
                }
                for mm in 1..m {
                    days += days_in_month_1900(y, mm as u32);
                }
                1 + days
            } else {
                let base = NaiveDate::from_ymd_opt(1899, 12, 31)?;
                let d = NaiveDate::from_ymd_opt(y, m as u32, 1)?;
                (d - base).num_days()
            }
        };
        start_of_month_serial
    };
    serial += (day - 1) as i64;

    serial_to_date(serial).or_else(|| if serial == 60 { NaiveDate::from_ymd_opt(1900, 2, 28) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_serials_round_trip() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let serial = date_to_serial(d);
        assert_eq!(serial_to_date(serial), Some(d));
    }

    #[test]
    fn date_before_the_fictional_leap_day_is_unaffected() {
        let d = NaiveDate::from_ymd_opt(1900, 2, 1).unwrap();
        assert_eq!(date_to_serial(d), 32);
    }

    #[test]
    fn month_overflow_rolls_into_next_year() {
        let d = normalize_ymd(2023, 13, 1).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 1, 1));
    }

    #[test]
    fn day_zero_rolls_into_previous_month() {
        let d = normalize_ymd(2024, 3, 0).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 29));
    }

    #[test]
    fn two_digit_year_shifts_into_1900s() {
        let d = normalize_ymd(24, 3, 1).unwrap();
        assert_eq!(d.year(), 1924);
    }
}
