use chrono::{DateTime, Utc};

/// Describe `then` relative to `now`, e.g. "3 days ago" or "in an hour"
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let past = delta.num_milliseconds() >= 0;
    let seconds = (delta.num_milliseconds().abs() as f64) / 1000.0;

    let phrase = describe(seconds);
    if past {
        format!("{} ago", phrase)
    } else {
        format!("in {}", phrase)
    }
}

fn describe(seconds: f64) -> String {
    let days_exact = seconds / 86_400.0;
    let secs = seconds.round();
    let minutes = (seconds / 60.0).round();
    let hours = (seconds / 3_600.0).round();
    let days = days_exact.round();
    let months = (days_exact * 4_800.0 / 146_097.0).round();
    let years = (days_exact * 400.0 / 146_097.0).round();

    if secs < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes)
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours)
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days)
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{} months", months)
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{} years", years)
    }
}
