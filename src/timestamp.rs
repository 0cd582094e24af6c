//! Normalize the timestamp strings scraped from group feeds.
//!
//! Feeds render post ages in a dozen human-readable formats ("7h", "Yesterday
//! at 17:48", "24 January at 08:42", ...). Relative formats only mean
//! something next to the wall clock that observed them, so normalization runs
//! exactly once, at ingestion, against an explicitly supplied `now` and the
//! result is persisted. Re-deriving later with a later `now` would silently
//! shift every relative timestamp.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Month names accepted in scraped dates, 0-indexed January..December.
///
/// The monitored groups mix English and Norwegian locales, so both spellings
/// are in the table (grouped per month). Matching is case-sensitive to the
/// feed's capitalization; an unknown token makes the whole string fall
/// through to the unrecognized-format sentinel.
static MONTHS: &[(&str, u32)] = &[
    ("January", 1),
    ("Januar", 1),
    ("januar", 1),
    ("February", 2),
    ("Februar", 2),
    ("februar", 2),
    ("March", 3),
    ("Mars", 3),
    ("mars", 3),
    ("April", 4),
    ("april", 4),
    ("May", 5),
    ("Mai", 5),
    ("mai", 5),
    ("June", 6),
    ("Juni", 6),
    ("juni", 6),
    ("July", 7),
    ("Juli", 7),
    ("juli", 7),
    ("August", 8),
    ("august", 8),
    ("September", 9),
    ("september", 9),
    ("October", 10),
    ("Oktober", 10),
    ("oktober", 10),
    ("November", 11),
    ("november", 11),
    ("December", 12),
    ("Desember", 12),
    ("desember", 12),
];

fn month_number(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, n)| *n)
}

/// The "unknown/oldest" sentinel returned for unrecognized formats.
///
/// An unparseable timestamp sorts to the bottom of a recency-descending feed
/// instead of falsely appearing newest. (The alternative policy, treating
/// unknown as "now", floats malformed posts to the top of every query.)
#[must_use]
pub fn sentinel() -> NaiveDateTime {
    NaiveDateTime::UNIX_EPOCH
}

type Apply = fn(&Captures<'_>, NaiveDateTime) -> Option<NaiveDateTime>;

struct FormatRule {
    regex: &'static Lazy<Regex>,
    apply: Apply,
}

static FULL_WITH_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\p{L}+\s+(\d{1,2})\s+(\p{L}+)\s+(\d{4})\s+at\s+(\d{1,2}):(\d{2})$").unwrap()
});
static RELATIVE_MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)m$").unwrap());
static RELATIVE_HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)h$").unwrap());
static RELATIVE_DAYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)d$").unwrap());
static YESTERDAY_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Yesterday\s+at\s+(\d{1,2}):(\d{2})$").unwrap());
static DAY_MONTH_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s+(\p{L}+)\s+at\s+(\d{1,2}):(\d{2})$").unwrap());
static DAY_MONTH_YEAR_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s+(\p{L}+)\s+(\d{4})\s+at\s+(\d{1,2}):(\d{2})$").unwrap()
});
static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s+(\p{L}+)\s+(\d{4})$").unwrap());
static RECENTLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Recently$").unwrap());

/// The recognized grammar as an ordered rule table. First match wins, so the
/// order here is a contract: reordering changes which instant an ambiguous
/// string resolves to.
static FORMAT_RULES: &[FormatRule] = &[
    // "Monday 5 March 2024 at 09:00" (weekday token ignored, not validated)
    FormatRule {
        regex: &FULL_WITH_WEEKDAY,
        apply: apply_day_month_year_time,
    },
    // "5m"
    FormatRule {
        regex: &RELATIVE_MINUTES,
        apply: |caps, now| now.checked_sub_signed(Duration::try_minutes(parse_num(caps, 1)?)?),
    },
    // "7h"
    FormatRule {
        regex: &RELATIVE_HOURS,
        apply: |caps, now| now.checked_sub_signed(Duration::try_hours(parse_num(caps, 1)?)?),
    },
    // "2d"
    FormatRule {
        regex: &RELATIVE_DAYS,
        apply: |caps, now| now.checked_sub_signed(Duration::try_days(parse_num(caps, 1)?)?),
    },
    // "Yesterday at 17:48"
    FormatRule {
        regex: &YESTERDAY_AT,
        apply: apply_yesterday,
    },
    // "24 January at 08:42" (no year; rolls back a year if it lands in the future)
    FormatRule {
        regex: &DAY_MONTH_AT,
        apply: apply_day_month_time,
    },
    // "24 January 2024 at 08:42"
    FormatRule {
        regex: &DAY_MONTH_YEAR_AT,
        apply: |caps, now| {
            apply_parts(
                caps.get(3)?.as_str().parse().ok()?,
                caps.get(2)?.as_str(),
                caps.get(1)?.as_str().parse().ok()?,
                caps.get(4)?.as_str().parse().ok()?,
                caps.get(5)?.as_str().parse().ok()?,
                now,
            )
        },
    },
    // "5 May 2025" (no time; noon avoids biasing toward either end of the day)
    FormatRule {
        regex: &DAY_MONTH_YEAR,
        apply: |caps, now| {
            apply_parts(
                caps.get(3)?.as_str().parse().ok()?,
                caps.get(2)?.as_str(),
                caps.get(1)?.as_str().parse().ok()?,
                12,
                0,
                now,
            )
        },
    },
    // "Recently"
    FormatRule {
        regex: &RECENTLY,
        apply: |_, now| Some(now - Duration::minutes(1)),
    },
];

fn parse_num(caps: &Captures<'_>, idx: usize) -> Option<i64> {
    caps.get(idx)?.as_str().parse().ok()
}

fn apply_parts(
    year: i32,
    month_token: &str,
    day: u32,
    hour: u32,
    minute: u32,
    _now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let month = month_number(month_token)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

fn apply_day_month_year_time(caps: &Captures<'_>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    apply_parts(
        caps.get(3)?.as_str().parse().ok()?,
        caps.get(2)?.as_str(),
        caps.get(1)?.as_str().parse().ok()?,
        caps.get(4)?.as_str().parse().ok()?,
        caps.get(5)?.as_str().parse().ok()?,
        now,
    )
}

fn apply_yesterday(caps: &Captures<'_>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    (now.date() - Duration::days(1)).and_hms_opt(hour, minute, 0)
}

/// "D Month at HH:MM" with no year: assume now's year, and if that lands
/// strictly in the future the post must be from last year.
fn apply_day_month_time(caps: &Captures<'_>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let hour: u32 = caps.get(3)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(4)?.as_str().parse().ok()?;

    let this_year = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_hms_opt(hour, minute, 0)?;
    if this_year > now {
        NaiveDate::from_ymd_opt(now.year() - 1, month, day)?.and_hms_opt(hour, minute, 0)
    } else {
        Some(this_year)
    }
}

/// Normalize a raw scraped timestamp against a reference instant.
///
/// Pure and deterministic: the same `(raw, now)` pair always yields the same
/// result. Unrecognized formats (including unknown month tokens and
/// impossible calendar dates) yield [`sentinel()`].
#[must_use]
pub fn normalize(raw: &str, now: NaiveDateTime) -> NaiveDateTime {
    let trimmed = raw.trim();

    for rule in FORMAT_RULES {
        if let Some(caps) = rule.regex.captures(trimmed) {
            if let Some(instant) = (rule.apply)(&caps, now) {
                return instant;
            }
            // Matched the shape but not the calendar (bad month token,
            // 31 February, 25:00). Treat as unrecognized.
            return sentinel();
        }
    }

    sentinel()
}
