// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

/// Parse a clock style duration: `SS`, `MM:SS` or `HH:MM:SS`
///
/// Fractional seconds are dropped. Returns `None` for anything else.
pub fn parse_clock_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds: u64 = 0;
    for part in parts {
        let whole = part.split('.').next().unwrap_or(part);
        let number: u64 = whole.trim().parse().ok()?;
        seconds = seconds.checked_mul(60)?.checked_add(number)?;
    }

    Some(Duration::from_secs(seconds))
}

/// Format a duration as `HH:MM:SS`
pub fn format_clock_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_clock_duration("1800"), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_clock_duration("30:05"), Some(Duration::from_secs(1805)));
    }

    #[test]
    fn parses_hours_minutes_seconds() {
        assert_eq!(
            parse_clock_duration("01:02:03"),
            Some(Duration::from_secs(3723))
        );
    }

    #[test]
    fn drops_fractional_seconds() {
        assert_eq!(
            parse_clock_duration("00:00:10.5"),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_clock_duration(""), None);
        assert_eq!(parse_clock_duration("half an hour"), None);
        assert_eq!(parse_clock_duration("1:2:3:4"), None);
    }

    #[test]
    fn formats_as_clock() {
        assert_eq!(format_clock_duration(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(format_clock_duration(Duration::from_secs(59)), "00:00:59");
    }
}
