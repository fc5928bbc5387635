//! Calendar accounting-period arithmetic.
//!
//! Quota accounting windows advance by exactly one calendar month, with
//! the day-of-month clamped to the target month's length (Jan 31 steps to
//! Feb 28, or Feb 29 in a leap year).

use time::util::days_in_year_month;
use time::{Date, OffsetDateTime};

/// Advance a reset timestamp by one calendar month.
pub fn next_reset(at: OffsetDateTime) -> OffsetDateTime {
    let (year, month) = match at.month().next() {
        time::Month::January => (at.year() + 1, time::Month::January),
        next => (at.year(), next),
    };

    let day = at.day().min(days_in_year_month(year, month));
    // The clamped day always exists in the target month.
    let date = Date::from_calendar_date(year, month, day).unwrap_or(at.date());
    at.replace_date(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn advances_plain_month() {
        let at = datetime!(2025-03-15 09:30:00 UTC);
        assert_eq!(next_reset(at), datetime!(2025-04-15 09:30:00 UTC));
    }

    #[test]
    fn clamps_to_short_month() {
        let at = datetime!(2025-01-31 00:00:00 UTC);
        assert_eq!(next_reset(at), datetime!(2025-02-28 00:00:00 UTC));

        let leap = datetime!(2024-01-31 00:00:00 UTC);
        assert_eq!(next_reset(leap), datetime!(2024-02-29 00:00:00 UTC));
    }

    #[test]
    fn wraps_year_boundary() {
        let at = datetime!(2025-12-10 12:00:00 UTC);
        assert_eq!(next_reset(at), datetime!(2026-01-10 12:00:00 UTC));
    }
}
