use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// The UTC offset of `canonical_timezone` right now.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    get_offset_at(canonical_timezone, OffsetDateTime::now_utc())
}

/// The UTC offset of `canonical_timezone` at `instant`, accounting for daylight saving.
pub fn get_offset_at(canonical_timezone: &str, instant: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&instant).to_utc())
}

/// Read the wall clock time `local` in `canonical_timezone` and return the instant it names.
///
/// The offset is the one in force at `local` itself, not at the current time.
/// A time skipped by a daylight saving change is read with the offset from
/// before the change.
pub fn assume_timezone(
    local: PrimitiveDateTime,
    canonical_timezone: &str,
) -> Option<OffsetDateTime> {
    let guess = get_offset_at(canonical_timezone, local.assume_utc())?;
    let candidate = local.assume_offset(guess);
    let actual = get_offset_at(canonical_timezone, candidate)?;

    if actual == guess {
        Some(candidate)
    } else {
        Some(local.assume_offset(actual))
    }
}

#[cfg(test)]
mod tests {
    use time::{UtcOffset, macros::datetime};

    use super::{assume_timezone, get_local_offset, get_offset_at};

    #[test]
    fn unknown_timezone_gives_none() {
        assert_eq!(get_local_offset("Middle/Earth"), None);
        assert_eq!(
            assume_timezone(datetime!(2024-07-01 0:00), "Middle/Earth"),
            None
        );
    }

    #[test]
    fn offset_follows_daylight_saving() {
        let winter = get_offset_at("Pacific/Auckland", datetime!(2024-07-01 0:00 UTC)).unwrap();
        let summer = get_offset_at("Pacific/Auckland", datetime!(2024-01-01 0:00 UTC)).unwrap();

        assert_eq!(winter, UtcOffset::from_hms(12, 0, 0).unwrap());
        assert_eq!(summer, UtcOffset::from_hms(13, 0, 0).unwrap());
    }

    #[test]
    fn wall_clock_uses_offset_on_that_day() {
        assert_eq!(
            assume_timezone(datetime!(2024-07-01 0:00), "Pacific/Auckland"),
            Some(datetime!(2024-06-30 12:00 UTC))
        );
        assert_eq!(
            assume_timezone(datetime!(2024-01-01 0:00), "Pacific/Auckland"),
            Some(datetime!(2023-12-31 11:00 UTC))
        );
    }

    #[test]
    fn midnight_next_to_daylight_saving_change() {
        // Daylight saving ends at 3am on 7 April 2024, so 1 April is still +13.
        assert_eq!(
            assume_timezone(datetime!(2024-04-01 0:00), "Pacific/Auckland"),
            Some(datetime!(2024-03-31 11:00 UTC))
        );
        assert_eq!(
            assume_timezone(datetime!(2024-05-01 0:00), "Pacific/Auckland"),
            Some(datetime!(2024-04-30 12:00 UTC))
        );
    }
}
