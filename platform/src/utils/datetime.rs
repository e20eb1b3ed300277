//! Date and time helpers.

use std::fmt::{Display, Write};

use chrono::{DateTime, TimeZone, Utc};
use mockable::Clock;

/// Format used by SQL timestamp literals.
pub const SQL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The current instant in UTC.
#[must_use]
pub fn utc_now(clock: &impl Clock) -> DateTime<Utc> {
    clock.utc()
}

/// Render `dt` with a `strftime` pattern, [`SQL_DATE_FORMAT`] when `None`.
///
/// Returns `None` for patterns chrono cannot render.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use platform_kit::utils::format_datetime;
///
/// let dt = Utc.with_ymd_and_hms(2025, 9, 17, 8, 41, 32).unwrap();
/// assert_eq!(format_datetime(&dt, None).as_deref(), Some("2025-09-17 08:41:32"));
/// assert_eq!(
///     format_datetime(&dt, Some("%d.%m.%Y")).as_deref(),
///     Some("17.09.2025")
/// );
/// ```
#[must_use]
pub fn format_datetime<Tz>(dt: &DateTime<Tz>, pattern: Option<&str>) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    write!(out, "{}", dt.format(pattern.unwrap_or(SQL_DATE_FORMAT))).ok()?;
    Some(out)
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Describe how long ago `dt` was, relative to `clock`.
///
/// Years are 365 days and months 30 days. Anything under a minute, or in
/// the future, is "now".
///
/// # Examples
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use mockable::Clock;
/// use platform_kit::utils::time_ago;
///
/// # struct Fixed;
/// # impl Clock for Fixed {
/// #     fn local(&self) -> chrono::DateTime<chrono::Local> { self.utc().into() }
/// #     fn utc(&self) -> chrono::DateTime<Utc> {
/// #         Utc.with_ymd_and_hms(2025, 9, 17, 12, 0, 0).unwrap()
/// #     }
/// # }
/// let clock = Fixed;
/// assert_eq!(time_ago(clock.utc() - Duration::days(3), &clock), "3 days ago");
/// ```
#[must_use]
pub fn time_ago<Tz: TimeZone>(dt: DateTime<Tz>, clock: &impl Clock) -> String {
    let diff = clock.utc().signed_duration_since(dt);
    let days = diff.num_days();
    if days > 365 {
        return plural(days.div_euclid(365), "year");
    }
    if days > 30 {
        return plural(days.div_euclid(30), "month");
    }
    if days > 0 {
        return plural(days, "day");
    }
    let seconds = diff.num_seconds();
    if seconds > 3600 {
        return plural(seconds.div_euclid(3600), "hour");
    }
    if seconds > 60 {
        return plural(seconds.div_euclid(60), "minute");
    }
    "now".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixtureClock;
    use chrono::Duration;
    use rstest::{fixture, rstest};

    #[fixture]
    fn clock() -> FixtureClock {
        FixtureClock::new(
            Utc.with_ymd_and_hms(2025, 9, 17, 12, 0, 0)
                .single()
                .expect("valid instant"),
        )
    }

    #[rstest]
    fn now_comes_from_the_clock(clock: FixtureClock) {
        assert_eq!(utc_now(&clock), clock.utc());
    }

    #[rstest]
    fn sql_format_is_the_default(clock: FixtureClock) {
        assert_eq!(
            format_datetime(&clock.utc(), None).as_deref(),
            Some("2025-09-17 12:00:00")
        );
    }

    #[rstest]
    fn invalid_patterns_yield_none(clock: FixtureClock) {
        assert_eq!(format_datetime(&clock.utc(), Some("%Q")), None);
    }

    #[rstest]
    #[case(Duration::seconds(10), "now")]
    #[case(Duration::seconds(60), "now")]
    #[case(Duration::minutes(1) + Duration::seconds(1), "1 minute ago")]
    #[case(Duration::minutes(5), "5 minutes ago")]
    #[case(Duration::hours(1) + Duration::seconds(1), "1 hour ago")]
    #[case(Duration::hours(23), "23 hours ago")]
    #[case(Duration::days(1), "1 day ago")]
    #[case(Duration::days(30), "30 days ago")]
    #[case(Duration::days(31), "1 month ago")]
    #[case(Duration::days(95), "3 months ago")]
    #[case(Duration::days(366), "1 year ago")]
    #[case(Duration::days(800), "2 years ago")]
    #[case(Duration::days(-2), "now")]
    fn relative_descriptions(clock: FixtureClock, #[case] age: Duration, #[case] expected: &str) {
        assert_eq!(time_ago(clock.utc() - age, &clock), expected);
    }
}
