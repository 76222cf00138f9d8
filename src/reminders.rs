//! Reminder time-expression parsing
//!
//! Patterns are tried in a fixed order and the first match wins:
//! 1. `<text> in N minutes|hours`
//! 2. `<text> tomorrow at H[:M][am|pm]`
//! 3. `<text> on <weekday> at H[:M][am|pm]`
//! 4. `<text> at H[:M][am|pm] [today]` (rolls to tomorrow if already past)

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s+in\s+(\d+)\s+(minute|minutes|min|mins|hour|hours|hr|hrs)(?:\s+.*)?$")
        .unwrap()
});

static RE_TOMORROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s+tomorrow\s+at\s+(\d+(?::\d+)?)\s*(am|pm)?(?:\s+.*)?$").unwrap()
});

static RE_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(.*?)\s+on\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\s+at\s+(\d+(?::\d+)?)\s*(am|pm)?(?:\s+.*)?$",
    )
    .unwrap()
});

static RE_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s+at\s+(\d+(?::\d+)?)\s*(am|pm)?(?:\s+today)?(?:\s+.*)?$").unwrap()
});

/// Text and fire time extracted from a `/remind` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReminder<Tz: TimeZone> {
    pub text: String,
    pub at: DateTime<Tz>,
}

/// Parse relative to `now`. `None` means the time could not be understood.
pub fn parse_reminder<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> Option<ParsedReminder<Tz>> {
    let input = input.trim();

    if let Some(caps) = RE_RELATIVE.captures(input) {
        let amount: i64 = caps[2].parse().ok()?;
        let delta = match caps[3].to_lowercase().as_str() {
            "minute" | "minutes" | "min" | "mins" => Duration::try_minutes(amount)?,
            _ => Duration::try_hours(amount)?,
        };
        let at = now.clone().checked_add_signed(delta)?;
        return finish(&caps, at);
    }

    if let Some(caps) = RE_TOMORROW.captures(input) {
        let (hour, minute) = parse_time(&caps[2], caps.get(3).map(|m| m.as_str()))?;
        let date = now.date_naive().succ_opt()?;
        let at = at_local(now, date, hour, minute)?;
        return finish(&caps, at);
    }

    if let Some(caps) = RE_WEEKDAY.captures(input) {
        let target: Weekday = caps[2].parse().ok()?;
        let (hour, minute) = parse_time(&caps[3], caps.get(4).map(|m| m.as_str()))?;
        let current = now.weekday().num_days_from_monday() as i64;
        let mut days_ahead = target.num_days_from_monday() as i64 - current;
        if days_ahead <= 0 {
            days_ahead += 7;
        }
        let date = now
            .date_naive()
            .checked_add_signed(Duration::try_days(days_ahead)?)?;
        let at = at_local(now, date, hour, minute)?;
        return finish(&caps, at);
    }

    if let Some(caps) = RE_AT.captures(input) {
        let (hour, minute) = parse_time(&caps[2], caps.get(3).map(|m| m.as_str()))?;
        let mut at = at_local(now, now.date_naive(), hour, minute)?;
        if at < *now {
            at = at_local(now, now.date_naive().succ_opt()?, hour, minute)?;
        }
        return finish(&caps, at);
    }

    None
}

fn finish<Tz: TimeZone>(caps: &Captures<'_>, at: DateTime<Tz>) -> Option<ParsedReminder<Tz>> {
    let text = caps[1].trim();
    if text.is_empty() {
        return None;
    }
    Some(ParsedReminder {
        text: text.to_string(),
        at,
    })
}

fn at_local<Tz: TimeZone>(now: &DateTime<Tz>, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    now.timezone().from_local_datetime(&naive).earliest()
}

/// `H[:M]` plus optional am/pm into 24-hour (hour, minute)
pub fn parse_time(time: &str, meridiem: Option<&str>) -> Option<(u32, u32)> {
    let mut parts = time.splitn(2, ':');
    let mut hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };

    match meridiem.map(|m| m.to_lowercase()).as_deref() {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }

    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
