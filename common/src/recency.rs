//! Posting age detection from free text.

use chrono::{Duration, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Published:01/31/2025", "Date Posted: 2025-01-31", "posted : 1/31/2025"
    static ref LABELED_DATE_REGEX: Regex = Regex::new(
        r"(?i)\b(?:date\s+posted|published|posted)\s*:\s*(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})"
    ).unwrap();

    static ref BARE_DATE_REGEX: Regex = Regex::new(
        r"\b(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})\b"
    ).unwrap();

    static ref DAYS_AGO_REGEX: Regex = Regex::new(
        r"(?i)\b(\d+)\s+days?\s+ago\b"
    ).unwrap();
}

/// Age signal found in a posting's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSignal {
    Date(NaiveDate),
    DaysAgo(i64),
}

/// Whether a posting falls inside the last `window_days`, judged against
/// today's local date.
pub fn is_recent(text: &str, window_days: u32) -> bool {
    is_recent_on(text, window_days, Local::now().date_naive())
}

/// [`is_recent`] with an explicit reference date.
///
/// Undateable text counts as recent.
pub fn is_recent_on(text: &str, window_days: u32, today: NaiveDate) -> bool {
    let window = i64::from(window_days);
    match find_date_signal(text) {
        // a window reaching past the calendar's start admits every date
        Some(DateSignal::Date(date)) => today
            .checked_sub_signed(Duration::days(window))
            .is_none_or(|cutoff| date >= cutoff),
        Some(DateSignal::DaysAgo(days)) => days <= window,
        None => true,
    }
}

/// First usable age signal. Labeled dates beat bare dates, and any date
/// beats an "N days ago" phrase. Dates that fail to parse are skipped.
pub fn find_date_signal(text: &str) -> Option<DateSignal> {
    let labeled = LABELED_DATE_REGEX.captures_iter(text);
    let bare = BARE_DATE_REGEX.captures_iter(text);

    let date = labeled
        .chain(bare)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_date(m.as_str()));

    if let Some(date) = date {
        return Some(DateSignal::Date(date));
    }

    DAYS_AGO_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .next()
        .map(DateSignal::DaysAgo)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}
