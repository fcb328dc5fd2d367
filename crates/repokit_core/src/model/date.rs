//! Human-readable rendering for stored timestamps.
//!
//! Timestamps older (or further ahead) than `max_days` whole days render with
//! an explicit format; closer ones render as a relative phrase such as
//! `2 hours ago`. Month and year units use fixed 30 and 365 day lengths.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt::Write;

pub const DEFAULT_DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
pub const DEFAULT_MAX_DAYS: i64 = 3;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

/// Renders `timestamp` relative to the current time.
pub fn humanize_timestamp(timestamp: DateTime<Utc>, format: &str, max_days: i64) -> String {
    humanize_timestamp_at(timestamp, Utc::now(), format, max_days)
}

/// Renders `timestamp` relative to `now`.
pub fn humanize_timestamp_at(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    format: &str,
    max_days: i64,
) -> String {
    let delta = now.signed_duration_since(timestamp);
    if delta.num_days().abs() > max_days {
        return format_or_rfc3339(timestamp, format);
    }
    relative_phrase(delta)
}

/// Converts stored epoch milliseconds into a UTC timestamp.
pub fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

fn format_or_rfc3339(timestamp: DateTime<Utc>, format: &str) -> String {
    let mut rendered = String::new();
    // chrono reports unknown specifiers as a fmt error instead of text
    if write!(rendered, "{}", timestamp.format(format)).is_err() {
        return timestamp.to_rfc3339();
    }
    rendered
}

fn relative_phrase(delta: TimeDelta) -> String {
    let future = delta < TimeDelta::zero();
    let seconds = delta.num_seconds().unsigned_abs();

    let (count, unit) = if seconds >= YEAR {
        (seconds / YEAR, "year")
    } else if seconds >= MONTH {
        (seconds / MONTH, "month")
    } else if seconds >= WEEK {
        (seconds / WEEK, "week")
    } else if seconds >= DAY {
        (seconds / DAY, "day")
    } else if seconds >= HOUR {
        (seconds / HOUR, "hour")
    } else if seconds >= MINUTE {
        (seconds / MINUTE, "minute")
    } else {
        (seconds.max(1), "second")
    };

    let plural = if count == 1 { "" } else { "s" };
    if future {
        format!("{count} {unit}{plural} from now")
    } else {
        format!("{count} {unit}{plural} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        humanize_timestamp_at, timestamp_from_millis, DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS,
    };
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn recent_timestamps_render_relative() {
        let ts = now() - TimeDelta::hours(2);
        assert_eq!(
            humanize_timestamp_at(ts, now(), DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS),
            "2 hours ago"
        );

        let ts = now() - TimeDelta::minutes(1);
        assert_eq!(
            humanize_timestamp_at(ts, now(), DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS),
            "1 minute ago"
        );
    }

    #[test]
    fn future_timestamps_render_from_now() {
        let ts = now() + TimeDelta::minutes(3);
        assert_eq!(
            humanize_timestamp_at(ts, now(), DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS),
            "3 minutes from now"
        );
    }

    #[test]
    fn boundary_day_count_still_renders_relative() {
        let ts = now() - TimeDelta::days(3);
        assert_eq!(
            humanize_timestamp_at(ts, now(), DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS),
            "3 days ago"
        );
    }

    #[test]
    fn old_timestamps_use_format() {
        let ts = now() - TimeDelta::days(5);
        assert_eq!(
            humanize_timestamp_at(ts, now(), DEFAULT_DATE_FORMAT, DEFAULT_MAX_DAYS),
            "12-10-2026 12:00:00"
        );
    }

    #[test]
    fn millis_convert_to_utc() {
        let ts = timestamp_from_millis(now().timestamp_millis()).unwrap();
        assert_eq!(ts, now());
    }
}
