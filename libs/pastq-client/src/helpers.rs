//! Display formatting for sizes, text and backend timestamps.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

const NOT_AVAILABLE: &str = "N/A";

/// Human-readable size with binary units: `0 Bytes`, `512 Bytes`,
/// `1.5 KB`, `2.25 MB`. At most two decimals, trailing zeros dropped.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

/// Parse a backend timestamp: RFC 3339, or a bare `YYYY-MM-DD` date taken
/// as midnight UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
}

/// `Mar 05, 2024 14:30`, or `N/A` for missing and unparseable values.
#[must_use]
pub fn format_date_time(raw: Option<&str>) -> String {
    raw.and_then(parse_timestamp).map_or_else(
        || NOT_AVAILABLE.to_owned(),
        |ts| ts.format("%b %d, %Y %H:%M").to_string(),
    )
}

/// `3 days ago`, `about 2 hours ago`, `in 5 minutes`. `N/A` when missing,
/// `some time ago` when unparseable.
#[must_use]
pub fn format_relative_time(raw: Option<&str>) -> String {
    format_relative_time_at(raw, Utc::now())
}

/// [`format_relative_time`] against an explicit clock.
#[must_use]
pub fn format_relative_time_at(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = raw else {
        return NOT_AVAILABLE.to_owned();
    };
    let Some(ts) = parse_timestamp(raw) else {
        return "some time ago".to_owned();
    };

    let delta = now.signed_duration_since(ts.with_timezone(&Utc));
    let seconds = delta.num_seconds();
    let distance = distance_in_words(seconds.unsigned_abs());
    if seconds >= 0 {
        format!("{distance} ago")
    } else {
        format!("in {distance}")
    }
}

fn distance_in_words(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const MONTH: u64 = 30 * DAY;
    const YEAR: u64 = 365 * DAY;

    let rounded = |unit: u64| (seconds + unit / 2) / unit;
    let plural = |n: u64, word: &str| {
        if n == 1 {
            format!("1 {word}")
        } else {
            format!("{n} {word}s")
        }
    };

    match seconds {
        s if s < 30 => "less than a minute".to_owned(),
        s if s < 90 => "1 minute".to_owned(),
        s if s < 45 * MINUTE => plural(rounded(MINUTE), "minute"),
        s if s < 90 * MINUTE => "about 1 hour".to_owned(),
        s if s < DAY => format!("about {}", plural(rounded(HOUR), "hour")),
        s if s < 42 * HOUR => "1 day".to_owned(),
        s if s < MONTH => plural(rounded(DAY), "day"),
        s if s < 2 * MONTH => "about 1 month".to_owned(),
        s if s < YEAR => plural(rounded(MONTH), "month"),
        _ => format!("about {}", plural(seconds / YEAR, "year")),
    }
}
