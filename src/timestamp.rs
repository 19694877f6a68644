//! Parsing user supplied dates and working out calendar month boundaries.
//!
//! Months are 0-based throughout the API (January is 0), matching how the
//! frontend sends them.

use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::{Error, timezone::assume_timezone};

const DATE_TIME_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const DATE_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[year]/[month]/[day]"),
];

/// Parse a timestamp string, returning it in UTC.
///
/// Accepts RFC 3339, date-times without an offset and plain dates. Anything
/// without an explicit offset is read as wall clock time in `local_timezone`,
/// using the offset in force on that date, and plain dates are taken to be
/// midnight.
///
/// Returns `None` if `text` does not match any supported format or
/// `local_timezone` is unknown.
pub fn parse_timestamp(text: &str, local_timezone: &str) -> Option<OffsetDateTime> {
    let text = text.trim();

    if text.is_empty() {
        return None;
    }

    if let Ok(timestamp) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(timestamp.to_offset(UtcOffset::UTC));
    }

    let local = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| Date::parse(text, format).ok())
                .map(|date| date.midnight())
        })?;

    assume_timezone(local, local_timezone).map(|timestamp| timestamp.to_offset(UtcOffset::UTC))
}

/// The 0-based month and the year that `timestamp` falls in at `local_offset`.
pub fn month_of(timestamp: OffsetDateTime, local_offset: UtcOffset) -> (u8, i32) {
    let local = timestamp.to_offset(local_offset);

    (u8::from(local.month()) - 1, local.year())
}

/// The half-open range `[start, end)` covering the 0-based `month` of `year`.
///
/// Both bounds are local midnight in `local_timezone`, each with the offset in
/// force at that midnight, so a month with a daylight saving change is not
/// shifted by an hour at either end.
///
/// # Errors
/// Returns [Error::Validation] if `month` is not in `0..=11` or `year` is out of range,
/// or [Error::InvalidTimezoneError] if `local_timezone` is unknown.
pub fn month_bounds(
    month: u8,
    year: i32,
    local_timezone: &str,
) -> Result<(OffsetDateTime, OffsetDateTime), Error> {
    let calendar_month = Month::try_from(month.saturating_add(1))
        .map_err(|_| Error::Validation(format!("month {month} must be between 0 and 11")))?;
    let (next_month, next_year) = match calendar_month {
        Month::December => (Month::January, year + 1),
        other => (other.next(), year),
    };

    let first_of = |year: i32, month: Month| {
        let date = Date::from_calendar_date(year, month, 1)
            .map_err(|error| Error::Validation(format!("invalid month {month} {year}: {error}")))?;

        assume_timezone(date.midnight(), local_timezone)
            .ok_or_else(|| Error::InvalidTimezoneError(local_timezone.to_owned()))
    };

    Ok((first_of(year, calendar_month)?, first_of(next_year, next_month)?))
}


#[cfg(test)]
mod month_tests {
    use time::{UtcOffset, macros::datetime};

    use super::{month_bounds, month_of};
    use crate::Error;

    #[test]
    fn month_is_zero_based() {
        assert_eq!(
            month_of(datetime!(2024-11-15 12:00 UTC), UtcOffset::UTC),
            (10, 2024)
        );
        assert_eq!(
            month_of(datetime!(2024-01-01 0:00 UTC), UtcOffset::UTC),
            (0, 2024)
        );
    }

    #[test]
    fn month_uses_local_offset() {
        let offset = UtcOffset::from_hms(13, 0, 0).unwrap();

        // Already the first of December in New Zealand.
        assert_eq!(
            month_of(datetime!(2024-11-30 12:00 UTC), offset),
            (11, 2024)
        );
    }

    #[test]
    fn december_rolls_over_to_next_year() {
        let (start, end) = month_bounds(11, 2024, "Etc/UTC").unwrap();

        assert_eq!(start, datetime!(2024-12-01 0:00 UTC));
        assert_eq!(end, datetime!(2025-01-01 0:00 UTC));
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(matches!(
            month_bounds(12, 2024, "Etc/UTC"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn bounds_use_offset_at_each_midnight() {
        // Daylight saving ends in New Zealand on 7 April 2024.
        let (start, end) = month_bounds(3, 2024, "Pacific/Auckland").unwrap();

        assert_eq!(start, datetime!(2024-03-31 11:00 UTC));
        assert_eq!(end, datetime!(2024-04-30 12:00 UTC));
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert_eq!(
            month_bounds(3, 2024, "Middle/Earth"),
            Err(Error::InvalidTimezoneError("Middle/Earth".to_owned()))
        );
    }
}
