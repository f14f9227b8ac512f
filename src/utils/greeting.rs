#![forbid(unsafe_code)]

use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::Deserialize;

use crate::utils::errors::Errors;

// Wire and storage format of a date of birth.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// How far ahead the early reminder is given.
const REMINDER_DAYS: i64 = 5;

// ***************************************************************************
//                                  Types
// ***************************************************************************
/** How a date of birth is compared with today's date.
 *
 * DayOfMonth looks only at the day of the month: month and year are ignored
 * and there is no rollover between months, so a birthday on the 29th is
 * never announced on the 3rd of the following month.  Its reminder fires
 * when today's day is five AFTER the birth day (born on the 10th, reminded
 * on the 15th).  This is the default.
 *
 * Calendar compares month and day and counts days to the next birthday,
 * crossing month and year boundaries.  Its reminder fires five days BEFORE
 * the birthday (born 10 November, reminded on 5 November), the opposite
 * direction from DayOfMonth.  A 29 February birthday falls on 28 February in
 * common years.
 */
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreetingMode {
    #[default]
    DayOfMonth,
    Calendar,
}

/** The three mutually exclusive greetings. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occasion {
    InFiveDays,
    Birthday,
    Plain,
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// greet:
// ---------------------------------------------------------------------------
/** Build the greeting for a stored user.  A date of birth that doesn't parse
 * is logged and produces the plain greeting.
 */
pub fn greet(name: &str, date_of_birth: &str, today: NaiveDate, mode: GreetingMode) -> String {
    let occasion = match parse_date_of_birth(date_of_birth) {
        Ok(dob) => occasion(dob, today, mode),
        Err(e) => {
            warn!("{}", e);
            Occasion::Plain
        }
    };
    message(name, occasion)
}

// ---------------------------------------------------------------------------
// parse_date_of_birth:
// ---------------------------------------------------------------------------
pub fn parse_date_of_birth(date_of_birth: &str) -> Result<NaiveDate, Errors> {
    NaiveDate::parse_from_str(date_of_birth, DATE_FORMAT)
        .map_err(|e| Errors::DateFormat(date_of_birth.to_string(), e.to_string()))
}

// ---------------------------------------------------------------------------
// occasion:
// ---------------------------------------------------------------------------
pub fn occasion(dob: NaiveDate, today: NaiveDate, mode: GreetingMode) -> Occasion {
    match mode {
        GreetingMode::DayOfMonth => day_of_month_occasion(dob, today),
        GreetingMode::Calendar => calendar_occasion(dob, today),
    }
}

// ---------------------------------------------------------------------------
// message:
// ---------------------------------------------------------------------------
pub fn message(name: &str, occasion: Occasion) -> String {
    match occasion {
        Occasion::InFiveDays => format!("Hello, {}! Your birthday in 5 days", name),
        Occasion::Birthday => format!("Hello, {}! Happy Birthday!", name),
        Occasion::Plain => format!("Hello, {}!", name),
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// The five day check is evaluated first; it can't overlap the birthday check.
fn day_of_month_occasion(dob: NaiveDate, today: NaiveDate) -> Occasion {
    let delta_day = today.day() as i64 - dob.day() as i64;
    if delta_day == REMINDER_DAYS {
        Occasion::InFiveDays
    } else if delta_day == 0 {
        Occasion::Birthday
    } else {
        Occasion::Plain
    }
}

fn calendar_occasion(dob: NaiveDate, today: NaiveDate) -> Occasion {
    let next = match next_birthday(dob, today) {
        Some(d) => d,
        None => return Occasion::Plain,
    };
    let days = (next - today).num_days();
    if days == REMINDER_DAYS {
        Occasion::InFiveDays
    } else if days == 0 {
        Occasion::Birthday
    } else {
        Occasion::Plain
    }
}

// The first birthday on or after today.
fn next_birthday(dob: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = birthday_in_year(dob, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        birthday_in_year(dob, today.year() + 1)
    }
}

fn birthday_in_year(dob: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, dob.month(), dob.day())
        // 29 February in a common year.
        .or_else(|| NaiveDate::from_ymd_opt(year, dob.month(), dob.day() - 1))
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn birthday_on_same_day_of_month() {
        let msg = greet("testuser", "2000-11-10", ymd(2024, 3, 10), GreetingMode::DayOfMonth);
        assert_eq!(msg, "Hello, testuser! Happy Birthday!");
    }

    #[test]
    fn five_days_when_today_is_five_past_dob_day() {
        let msg = greet("ann", "1990-07-04", ymd(2024, 2, 9), GreetingMode::DayOfMonth);
        assert_eq!(msg, "Hello, ann! Your birthday in 5 days");
    }

    #[test]
    fn plain_otherwise() {
        let msg = greet("ann", "1990-07-04", ymd(2024, 7, 5), GreetingMode::DayOfMonth);
        assert_eq!(msg, "Hello, ann!");

        // Five days before the day of month is not the reminder.
        let msg = greet("ann", "1990-07-09", ymd(2024, 7, 4), GreetingMode::DayOfMonth);
        assert_eq!(msg, "Hello, ann!");
    }

    #[test]
    fn day_of_month_ignores_month_rollover() {
        // Day 1 against day 29 of the previous month is not detected.
        let msg = greet("bob", "1985-01-29", ymd(2024, 2, 3), GreetingMode::DayOfMonth);
        assert_eq!(msg, "Hello, bob!");
        assert_eq!(occasion(ymd(1985, 1, 29), ymd(2024, 3, 1), GreetingMode::DayOfMonth),
                   Occasion::Plain);
    }

    #[test]
    fn bad_date_degrades_to_plain() {
        for bad in ["", "10/11/2000", "2000-13-01", "2000-02-30", "yesterday"] {
            assert_eq!(greet("eve", bad, ymd(2024, 1, 10), GreetingMode::DayOfMonth), "Hello, eve!");
        }
    }

    #[test]
    fn parse_errors_are_date_format_errors() {
        assert!(matches!(parse_date_of_birth("2000-1-1x"), Err(Errors::DateFormat(_, _))));
        assert_eq!(parse_date_of_birth("2000-11-10").expect("valid"), ymd(2000, 11, 10));
    }

    #[test]
    fn day_of_month_branches_are_exhaustive_and_exclusive() {
        let dob = ymd(2000, 1, 10);
        let mut counts = (0, 0, 0);
        for day in 1..=31 {
            match occasion(dob, ymd(2024, 1, day), GreetingMode::DayOfMonth) {
                Occasion::InFiveDays => { assert_eq!(day, 15); counts.0 += 1; }
                Occasion::Birthday => { assert_eq!(day, 10); counts.1 += 1; }
                Occasion::Plain => counts.2 += 1,
            }
        }
        assert_eq!(counts, (1, 1, 29));
    }

    #[test]
    fn calendar_mode_requires_matching_month() {
        let dob = ymd(2000, 11, 10);
        assert_eq!(occasion(dob, ymd(2024, 11, 10), GreetingMode::Calendar), Occasion::Birthday);
        assert_eq!(occasion(dob, ymd(2024, 3, 10), GreetingMode::Calendar), Occasion::Plain);
        assert_eq!(occasion(dob, ymd(2024, 11, 5), GreetingMode::Calendar), Occasion::InFiveDays);
    }

    #[test]
    fn calendar_mode_crosses_month_and_year() {
        assert_eq!(occasion(ymd(1985, 3, 2), ymd(2023, 2, 25), GreetingMode::Calendar),
                   Occasion::InFiveDays);
        assert_eq!(occasion(ymd(1985, 1, 2), ymd(2023, 12, 28), GreetingMode::Calendar),
                   Occasion::InFiveDays);
    }

    #[test]
    fn calendar_mode_leap_day_birthday() {
        let dob = ymd(2000, 2, 29);
        assert_eq!(occasion(dob, ymd(2023, 2, 28), GreetingMode::Calendar), Occasion::Birthday);
        assert_eq!(occasion(dob, ymd(2024, 2, 29), GreetingMode::Calendar), Occasion::Birthday);
        assert_eq!(occasion(dob, ymd(2024, 2, 24), GreetingMode::Calendar), Occasion::InFiveDays);
    }

    #[test]
    fn modes_remind_in_opposite_directions() {
        let dob = ymd(2000, 11, 10);
        let after = ymd(2024, 11, 15);
        let before = ymd(2024, 11, 5);
        assert_eq!(occasion(dob, after, GreetingMode::DayOfMonth), Occasion::InFiveDays);
        assert_eq!(occasion(dob, after, GreetingMode::Calendar), Occasion::Plain);
        assert_eq!(occasion(dob, before, GreetingMode::DayOfMonth), Occasion::Plain);
        assert_eq!(occasion(dob, before, GreetingMode::Calendar), Occasion::InFiveDays);
    }
}
