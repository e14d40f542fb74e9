//! Countdown duration formatting and parsing

use std::sync::LazyLock;

use regex::Regex;

static MINUTE_SECOND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d{1,2})$").expect("Invalid mm:ss regex"));

static MINUTES_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*m(?:in)?$").expect("Invalid minutes regex"));

/// Format seconds as `MM:SS` (minutes are not wrapped into hours).
pub fn format_duration_clock(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Parse `MM:SS` input. Seconds must be at most 59 and the total positive.
pub fn parse_minute_second(raw: &str) -> Option<u64> {
    let caps = MINUTE_SECOND.captures(raw.trim())?;
    let minutes: u64 = caps[1].parse().ok()?;
    let seconds: u64 = caps[2].parse().ok()?;
    if seconds > 59 {
        return None;
    }
    let total = minutes.checked_mul(60)?.checked_add(seconds)?;
    (total > 0).then_some(total)
}

/// Parse a device list label back into seconds: `MM:SS`, `"5m"` or `"5 min"`.
pub fn parse_duration_label(raw: &str) -> Option<u64> {
    let normalized = raw.trim().to_lowercase();
    if let Some(total) = parse_minute_second(&normalized) {
        return Some(total);
    }
    let caps = MINUTES_ONLY.captures(&normalized)?;
    let minutes: u64 = caps[1].parse().ok()?;
    minutes.checked_mul(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_clock() {
        assert_eq!(format_duration_clock(0), "00:00");
        assert_eq!(format_duration_clock(150), "02:30");
        assert_eq!(format_duration_clock(7200), "120:00");
    }

    #[test]
    fn test_parse_minute_second() {
        assert_eq!(parse_minute_second("2:30"), Some(150));
        assert_eq!(parse_minute_second(" 10:05 "), Some(605));
        assert_eq!(parse_minute_second("0:00"), None);
        assert_eq!(parse_minute_second("1:60"), None);
        assert_eq!(parse_minute_second("1:234"), None);
        assert_eq!(parse_minute_second("abc"), None);
    }

    #[test]
    fn test_parse_duration_label() {
        assert_eq!(parse_duration_label("5m"), Some(300));
        assert_eq!(parse_duration_label("15 MIN"), Some(900));
        assert_eq!(parse_duration_label("01:00"), Some(60));
        assert_eq!(parse_duration_label("5 minutes"), None);
    }

    #[test]
    fn test_list_labels_parse_back() {
        for secs in [60, 300, 900, 3600, 7200] {
            assert_eq!(parse_duration_label(&format_duration_clock(secs)), Some(secs));
        }
    }
}
