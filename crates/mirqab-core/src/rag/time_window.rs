//! Heuristic time-window extraction from free-text queries.
//!
//! This is intentionally a narrow phrase matcher, not a date parser: it
//! only fires on explicit relative-time wording, to avoid treating
//! incidental word usage as a filter. Rules are an ordered list of
//! `(predicate, window builder)` pairs; the first matching predicate wins
//! and no further rules are consulted.

use chrono::{DateTime, Duration, Utc};

/// A half-open interval `[start, end)` anchored to the evaluation instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

type Predicate = fn(&str) -> bool;
type WindowBuilder = fn(DateTime<Utc>) -> TimeWindow;

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn last_hour_matches(q: &str) -> bool {
    contains_any(q, &["last hour", "past hour", "within the hour"])
}

fn last_hour(now: DateTime<Utc>) -> TimeWindow {
    TimeWindow {
        start: now - Duration::hours(1),
        end: now,
    }
}

// "today" is suppressed when "yesterday" also appears, so a question like
// "how many today vs yesterday" falls through to the yesterday rule.
fn last_day_matches(q: &str) -> bool {
    contains_any(q, &["last 24 hours", "past 24 hours", "last day"])
        || (q.contains("today") && !q.contains("yesterday"))
}

fn last_day(now: DateTime<Utc>) -> TimeWindow {
    TimeWindow {
        start: now - Duration::hours(24),
        end: now,
    }
}

// The bare word "yesterday" is not treated as a filter; it must co-occur
// with an interrogative or request verb. Deliberate precision/recall
// tradeoff inherited from field use.
fn yesterday_matches(q: &str) -> bool {
    q.contains("yesterday")
        && contains_any(q, &["how many", "what", "show", "were"])
}

fn yesterday(now: DateTime<Utc>) -> TimeWindow {
    let today_midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    TimeWindow {
        start: today_midnight - Duration::days(1),
        end: today_midnight,
    }
}

fn last_week_matches(q: &str) -> bool {
    contains_any(q, &["last week", "past week", "this week"])
}

fn last_week(now: DateTime<Utc>) -> TimeWindow {
    TimeWindow {
        start: now - Duration::days(7),
        end: now,
    }
}

fn last_night_matches(q: &str) -> bool {
    contains_any(q, &["last night", "tonight"])
}

// 18:00 yesterday through 06:00 today.
fn last_night(now: DateTime<Utc>) -> TimeWindow {
    let today_midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    TimeWindow {
        start: today_midnight - Duration::hours(6),
        end: today_midnight + Duration::hours(6),
    }
}

/// Rule table in priority order. First match wins.
const RULES: &[(Predicate, WindowBuilder)] = &[
    (last_hour_matches, last_hour),
    (last_day_matches, last_day),
    (yesterday_matches, yesterday),
    (last_week_matches, last_week),
    (last_night_matches, last_night),
];

/// Extract an explicit time constraint from the query, if any.
///
/// `now` is injected so callers (and tests) control the anchor instant.
pub fn extract_time_window(query: &str, now: DateTime<Utc>) -> Option<TimeWindow> {
    let q = query.to_lowercase();
    RULES
        .iter()
        .find(|(predicate, _)| predicate(&q))
        .map(|(_, builder)| builder(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_last_hour_ends_at_now() {
        let now = anchor();
        let window = extract_time_window("any detections in the last hour?", now).unwrap();
        assert_eq!(window.end, now);
        assert_eq!(window.start, now - Duration::hours(1));
    }

    #[test]
    fn test_today_is_a_rolling_24h_window() {
        let now = anchor();
        let window = extract_time_window("show me today's detections", now).unwrap();
        assert_eq!(window.end, now);
        assert_eq!(window.start, now - Duration::hours(24));
    }

    #[test]
    fn test_today_rule_suppressed_when_yesterday_present() {
        let now = anchor();
        // Must fall through to the yesterday rule, not the 24h rule.
        let window =
            extract_time_window("how many today compared to yesterday?", now).unwrap();
        let today_midnight = Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap();
        assert_eq!(window.start, today_midnight - Duration::days(1));
        assert_eq!(window.end, today_midnight);
    }

    #[test]
    fn test_yesterday_needs_interrogative_trigger() {
        let now = anchor();
        assert!(extract_time_window("yesterday was quiet", now).is_none());
        assert!(extract_time_window("it reminded me of yesterday", now).is_none());
    }

    #[test]
    fn test_yesterday_with_trigger_is_calendar_day() {
        let now = anchor();
        let window = extract_time_window("how many detections yesterday?", now).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2025, 10, 23, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_last_week() {
        let now = anchor();
        let window = extract_time_window("summary of this week", now).unwrap();
        assert_eq!(window.start, now - Duration::days(7));
        assert_eq!(window.end, now);
    }

    #[test]
    fn test_last_night_spans_evening_to_morning() {
        let now = anchor();
        let window = extract_time_window("what happened last night?", now).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2025, 10, 23, 18, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 10, 24, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_first_match_wins() {
        let now = anchor();
        // "last hour" outranks "today" even though both phrases appear.
        let window =
            extract_time_window("today, in the last hour, any movement?", now).unwrap();
        assert_eq!(window.start, now - Duration::hours(1));
    }

    #[test]
    fn test_no_time_phrase_yields_none() {
        assert!(extract_time_window("woodland camouflage equipment", anchor()).is_none());
        assert!(extract_time_window("", anchor()).is_none());
    }
}
