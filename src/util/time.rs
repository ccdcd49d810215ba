//! Time formatting utilities.
//!
//! Both functions take `now` explicitly so output follows the store clock.

use chrono::{DateTime, Utc};

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format a countdown to a future time, e.g. `in 29 days` or `in 3h 30m`.
///
/// Targets at or before `now` render as `expired`.
#[must_use]
pub fn format_countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = target.signed_duration_since(now);

    if duration.num_seconds() <= 0 {
        return "expired".to_string();
    }

    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours >= 24 {
        let days = duration.num_days();
        format!("in {days} day{}", plural(days))
    } else if hours > 0 {
        format!("in {hours}h {minutes}m")
    } else if minutes > 0 {
        format!("in {minutes}m")
    } else {
        format!("in {}s", duration.num_seconds())
    }
}

/// Format a relative time (past or future).
#[must_use]
pub fn format_relative_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(target);

    if duration.num_seconds().abs() < 60 {
        return "just now".to_string();
    }

    let minutes = duration.num_minutes().abs();
    let hours = duration.num_hours().abs();
    let days = duration.num_days().abs();

    let suffix = if duration.num_seconds() > 0 {
        "ago"
    } else {
        "from now"
    };

    if days > 0 {
        format!("{days} day{} {suffix}", plural(days))
    } else if hours > 0 {
        format!("{hours} hour{} {suffix}", plural(hours))
    } else {
        format!("{minutes} minute{} {suffix}", plural(minutes))
    }
}
