//! Date/time values: absolute instants and relative durations.
//!
//! An absolute date is a point in time (seconds + nanoseconds since the
//! epoch, always normalized to UTC internally). A relative date is a
//! duration expressed as a mix of calendar fields (years/months/days) and a
//! fixed seconds/microseconds remainder, because "one month" is not a fixed
//! number of seconds — adding it to an absolute date has to walk the
//! calendar, not just add 2,592,000 seconds.
//!
//! ISO-8601 week numbering (`dayOfWeek`, `week`) follows the rule that week
//! 1 of a year is the week containing that year's first Thursday, and weeks
//! run Monday to Sunday.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateValue {
    Absolute { epoch_seconds: i64, nanos: u32 },
    Relative(RelativeDate),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RelativeDate {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub seconds: i64,
    pub micros: i64,
}

const SECONDS_PER_DAY: i64 = 86_400;

impl DateValue {
    pub fn zero() -> Self {
        DateValue::Absolute {
            epoch_seconds: 0,
            nanos: 0,
        }
    }

    pub fn from_epoch_seconds(epoch_seconds: i64) -> Self {
        DateValue::Absolute {
            epoch_seconds,
            nanos: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(
            self,
            DateValue::Absolute {
                epoch_seconds: 0,
                nanos: 0
            }
        )
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, DateValue::Relative(_))
    }

    /// Coercion to an integer yields epoch seconds for an absolute date, or
    /// the fixed-seconds component for a relative one (years/months/days
    /// have no fixed length and are dropped, matching int-coercion of
    /// calendar-relative durations elsewhere in the runtime).
    pub fn to_epoch_seconds(&self) -> i64 {
        match self {
            DateValue::Absolute { epoch_seconds, .. } => *epoch_seconds,
            DateValue::Relative(r) => r.seconds,
        }
    }

    /// Add a relative duration to this date, applying calendar fields
    /// (years, months, days) before the fixed seconds remainder, the order
    /// that keeps "one month from Jan 31" well-defined (clamped to the
    /// target month's last day) before the day-level arithmetic runs.
    pub fn add_relative(&self, rel: &RelativeDate) -> DateValue {
        match self {
            DateValue::Absolute { epoch_seconds, nanos } => {
                let (y, mo, d, rem) = civil_from_epoch(*epoch_seconds);
                let total_months = y * 12 + (mo as i64 - 1) + rel.years as i64 * 12 + rel.months as i64;
                let new_year = total_months.div_euclid(12);
                let new_month = total_months.rem_euclid(12) as u32 + 1;
                let days_in_target = days_in_month(new_year, new_month);
                let new_day = (d as u32).min(days_in_target);
                let base = epoch_from_civil(new_year, new_month, new_day) + rem;
                let shifted = base + rel.days as i64 * SECONDS_PER_DAY + rel.seconds;
                DateValue::Absolute {
                    epoch_seconds: shifted,
                    nanos: *nanos,
                }
            }
            DateValue::Relative(a) => DateValue::Relative(RelativeDate {
                years: a.years + rel.years,
                months: a.months + rel.months,
                days: a.days + rel.days,
                seconds: a.seconds + rel.seconds,
                micros: a.micros + rel.micros,
            }),
        }
    }

    /// ISO-8601 day of week: 1 = Monday .. 7 = Sunday.
    pub fn iso_day_of_week(&self) -> u32 {
        let epoch = self.to_epoch_seconds();
        let days = epoch.div_euclid(SECONDS_PER_DAY);
        // 1970-01-01 was a Thursday (ISO weekday 4).
        (((days + 3).rem_euclid(7)) + 1) as u32
    }

    /// ISO-8601 week number (1..=53) and week-numbering year, which can
    /// differ from the calendar year for dates in the first/last days of
    /// December/January.
    pub fn iso_week(&self) -> (i64, u32) {
        let epoch = self.to_epoch_seconds();
        let days = epoch.div_euclid(SECONDS_PER_DAY);
        let weekday = self.iso_day_of_week() as i64; // 1..=7
        // Thursday of this ISO week determines the week-numbering year.
        let thursday_days = days - weekday + 4;
        let (year, _, _, _) = civil_from_epoch(thursday_days * SECONDS_PER_DAY);
        let jan1_thursday_anchor = epoch_from_civil(year, 1, 1).div_euclid(SECONDS_PER_DAY);
        let week = (thursday_days - jan1_thursday_anchor).div_euclid(7) + 1;
        (year, week as u32)
    }
}

impl RelativeDate {
    /// Normalize a signed seconds duration into a relative date with no
    /// year/month component — those have no fixed length, so an
    /// absolute-minus-absolute difference is only ever normalized down to
    /// days/hours/minutes/seconds, never up into months/years.
    pub fn from_seconds(total_seconds: i64) -> RelativeDate {
        let days = total_seconds.div_euclid(SECONDS_PER_DAY);
        let remainder = total_seconds.rem_euclid(SECONDS_PER_DAY);
        RelativeDate {
            years: 0,
            months: 0,
            days: days as i32,
            seconds: remainder,
            micros: 0,
        }
    }
}

/// Reverse of [`DateValue::iso_week`]: the absolute date for ISO
/// week-numbering year `year`, week `week` (1..=53), weekday `weekday`
/// (1 = Monday .. 7 = Sunday).
pub fn date_from_iso_week(year: i64, week: u32, weekday: u32) -> DateValue {
    let jan4 = epoch_from_civil(year, 1, 4);
    let jan4_weekday = DateValue::Absolute { epoch_seconds: jan4, nanos: 0 }.iso_day_of_week() as i64;
    let week1_monday = jan4 - (jan4_weekday - 1) * SECONDS_PER_DAY;
    let target = week1_monday + (week as i64 - 1) * 7 * SECONDS_PER_DAY + (weekday as i64 - 1) * SECONDS_PER_DAY;
    DateValue::Absolute { epoch_seconds: target, nanos: 0 }
}

fn is_leap_year(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

fn days_in_month(y: i64, m: u32) -> u32 {
    match m {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(y) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

/// Howard Hinnant's `days_from_civil`, adapted for seconds-since-epoch.
fn epoch_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    (era * 146097 + doe - 719468) * SECONDS_PER_DAY
}

/// Inverse of `epoch_from_civil`, returning (year, month, day, remainder
/// seconds within the day).
fn civil_from_epoch(epoch_seconds: i64) -> (i64, u32, u32, i64) {
    let days = epoch_seconds.div_euclid(SECONDS_PER_DAY);
    let rem = epoch_seconds.rem_euclid(SECONDS_PER_DAY);
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d, rem)
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateValue::Absolute { epoch_seconds, .. } => {
                let (y, m, d, rem) = civil_from_epoch(*epoch_seconds);
                write!(f, "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}", y, m, d, rem / 3600, (rem / 60) % 60, rem % 60)
            }
            DateValue::Relative(r) => write!(
                f,
                "P{}Y{}M{}DT{}S",
                r.years, r.months, r.days, r.seconds
            ),
        }
    }
}
