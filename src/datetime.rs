//! Date/time questions answered from the system clock

use chrono::{DateTime, Local, TimeZone};

const DATETIME_KEYWORDS: &[&str] = &[
    "current date",
    "today's date",
    "what day is it",
    "what is the date",
    "current time",
    "what time is it",
    "current day",
    "what day is today",
    "today is what day",
    "current month",
    "what month is it",
    "what is the month",
    "current year",
    "what year is it",
    "what is the year",
    "date today",
    "time now",
    "current datetime",
    "today date",
    "now date",
    "present date",
    "present time",
    "current moment",
    "right now",
    "what day of the week",
    "day of the week",
    "date and time",
    "time and date",
    "today",
    "now",
];

/// Lexical check, case-insensitive substring match. No LLM involved.
pub fn is_datetime_question(text: &str) -> bool {
    let lower = text.to_lowercase();
    DATETIME_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Answer a date/time question using the local clock
pub fn datetime_response(question: &str) -> String {
    datetime_response_at(question, Local::now())
}

pub fn datetime_response_at<Tz: TimeZone>(question: &str, now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let q = question.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

    let time_12h = now.format("%I:%M %p");
    let time_24h = now.format("%H:%M:%S");
    let date_readable = now.format("%A, %B %d, %Y");
    let date_iso = now.format("%Y-%m-%d");

    if has(&["time", "hour", "minute", "second"]) {
        format!(
            "The current time is {} ({} in 24-hour format).",
            time_12h, time_24h
        )
    } else if has(&["date", "day", "today"]) {
        format!(
            "Today's date is {} ({} in ISO format).",
            date_readable, date_iso
        )
    } else if has(&["weekday"]) {
        format!("Today is {}.", now.format("%A"))
    } else if has(&["month"]) {
        format!("The current month is {}.", now.format("%B"))
    } else if has(&["year"]) {
        format!("The current year is {}.", now.format("%Y"))
    } else {
        format!(
            "Current date: {} ({})\nCurrent time: {} ({})\nDay of week: {}\nMonth: {}\nYear: {}",
            date_readable,
            date_iso,
            time_12h,
            time_24h,
            now.format("%A"),
            now.format("%B"),
            now.format("%Y")
        )
    }
}

/// Clock context block handed to the LLM with factual questions
pub fn datetime_context() -> String {
    let now = Local::now();
    let utc = chrono::Utc::now();
    format!(
        "Current Date and Time Information:\n- Current date: {} ({})\n- Current time: {} ({})\n- UTC: {}\n",
        now.format("%A, %B %d, %Y"),
        now.format("%Y-%m-%d"),
        now.format("%I:%M %p"),
        now.format("%H:%M:%S"),
        utc.format("%Y-%m-%d %H:%M:%S")
    )
}
